//! Hooks fired on circuit breaker state transitions
//!
//! Hooks run after the breaker has released its lock, so a hook may safely
//! read the breaker's statistics.

use crate::circuit::CircuitState;
use std::sync::Arc;
use tracing::debug;

type Hook = Arc<dyn Fn(&str) + Send + Sync>;

/// A state change observed while holding the breaker lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
}

/// Callbacks for circuit breaker events
#[derive(Clone, Default)]
pub struct Callbacks {
    pub on_open: Option<Hook>,
    pub on_close: Option<Hook>,
    pub on_half_open: Option<Hook>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger_open(&self, circuit: &str) {
        if let Some(ref callback) = self.on_open {
            callback(circuit);
        }
    }

    pub fn trigger_close(&self, circuit: &str) {
        if let Some(ref callback) = self.on_close {
            callback(circuit);
        }
    }

    pub fn trigger_half_open(&self, circuit: &str) {
        if let Some(ref callback) = self.on_half_open {
            callback(circuit);
        }
    }

    pub(crate) fn dispatch(&self, circuit: &str, transition: Option<Transition>) {
        let Some(transition) = transition else {
            return;
        };
        debug!(
            circuit,
            from = transition.from.as_str(),
            to = transition.to.as_str(),
            "running transition hooks"
        );
        match transition.to {
            CircuitState::Open => self.trigger_open(circuit),
            CircuitState::HalfOpen => self.trigger_half_open(circuit),
            CircuitState::Closed => self.trigger_close(circuit),
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_open", &self.on_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_half_open", &self.on_half_open.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_dispatch_routes_by_target_state() {
        let seen = Arc::new(Mutex::new(Vec::new()));

        let mut callbacks = Callbacks::new();
        let log = seen.clone();
        callbacks.on_open =
            Some(Arc::new(move |name| log.lock().unwrap().push(format!("open:{name}"))));
        let log = seen.clone();
        callbacks.on_half_open =
            Some(Arc::new(move |name| log.lock().unwrap().push(format!("half_open:{name}"))));

        callbacks.dispatch(
            "api",
            Some(Transition {
                from: CircuitState::Closed,
                to: CircuitState::Open,
            }),
        );
        callbacks.dispatch(
            "api",
            Some(Transition {
                from: CircuitState::Open,
                to: CircuitState::HalfOpen,
            }),
        );
        // No close hook registered
        callbacks.dispatch(
            "api",
            Some(Transition {
                from: CircuitState::HalfOpen,
                to: CircuitState::Closed,
            }),
        );
        callbacks.dispatch("api", None);

        assert_eq!(*seen.lock().unwrap(), vec!["open:api", "half_open:api"]);
    }

    #[test]
    fn test_debug_hides_closures() {
        let callbacks = Callbacks::new();
        let rendered = format!("{callbacks:?}");
        assert!(rendered.contains("on_open: false"));
    }
}
