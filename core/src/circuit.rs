//! Circuit breaker implementation using state machines
//!
//! The breaker gates calls to one named dependency. Counters and the
//! state machine live behind a single mutex; the guarded operation itself
//! always runs with the lock released.
//!
//! ```text
//! Closed   --(failure_count >= failure_threshold)--> Open
//! Open     --(now - last_failure >= timeout, on next call)--> HalfOpen
//! HalfOpen --(any failure)--> Open
//! HalfOpen --(success_count >= success_threshold)--> Closed
//! ```
//!
//! The Open -> HalfOpen check and the trial call are not atomic: callers
//! racing at timeout expiry may all be admitted as trial calls.

use crate::{
    builder::CircuitBuilder,
    callbacks::{Callbacks, Transition},
    clock::MonotonicClock,
    errors::{CircuitError, ConfigError},
    machine::{BreakerMachine, CircuitContext},
    outcomes::OutcomeWindow,
    stats::BreakerStatistics,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::{error, info, warn};

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures (while closed) required to open the circuit
    pub failure_threshold: usize,

    /// Consecutive trial successes required to close a half-open circuit
    pub success_threshold: usize,

    /// Seconds after the last failure before an open circuit admits a trial call
    pub timeout_secs: f64,

    /// Capacity of the recent-outcome window used for diagnostics
    pub window_size: usize,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout_secs: 60.0,
            window_size: 10,
        }
    }
}

impl BreakerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::Zero {
                field: "failure_threshold",
            });
        }
        if self.success_threshold == 0 {
            return Err(ConfigError::Zero {
                field: "success_threshold",
            });
        }
        if self.window_size == 0 {
            return Err(ConfigError::Zero {
                field: "window_size",
            });
        }
        if !self.timeout_secs.is_finite() || self.timeout_secs < 0.0 {
            return Err(ConfigError::InvalidDuration {
                field: "timeout_secs",
                value: self.timeout_secs,
            });
        }
        Ok(())
    }
}

/// Externally visible circuit state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable breaker state, guarded by the breaker's mutex
struct BreakerCore {
    machine: BreakerMachine,
    recent_results: OutcomeWindow,
    last_failure_time: Option<f64>,
    last_state_change: f64,
    total_calls: u64,
    total_successes: u64,
    total_failures: u64,
    total_rejections: u64,
}

impl BreakerCore {
    fn new(context: &CircuitContext) -> Self {
        Self {
            machine: BreakerMachine::new(context.clone()),
            recent_results: OutcomeWindow::new(context.config.window_size),
            last_failure_time: None,
            last_state_change: context.clock.now(),
            total_calls: 0,
            total_successes: 0,
            total_failures: 0,
            total_rejections: 0,
        }
    }

    fn state(&self) -> CircuitState {
        self.machine.state()
    }
}

/// Circuit breaker public API
///
/// All methods take `&self`; share a breaker between threads with `Arc`.
pub struct CircuitBreaker {
    context: CircuitContext,
    callbacks: Callbacks,
    core: Mutex<BreakerCore>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker on the monotonic clock (use builder() for more options)
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        let context = CircuitContext::new(name, config, Arc::new(MonotonicClock::new()));
        Self::with_context_and_callbacks(context, Callbacks::new())
    }

    /// Create a circuit breaker with custom context and callbacks (used by builder)
    pub(crate) fn with_context_and_callbacks(context: CircuitContext, callbacks: Callbacks) -> Self {
        let core = BreakerCore::new(&context);

        info!(
            circuit = %context.name,
            failure_threshold = context.config.failure_threshold,
            success_threshold = context.config.success_threshold,
            timeout_secs = context.config.timeout_secs,
            window_size = context.config.window_size,
            "circuit breaker initialized"
        );

        Self {
            context,
            callbacks,
            core: Mutex::new(core),
        }
    }

    /// Create a new circuit breaker builder
    pub fn builder(name: impl Into<String>) -> CircuitBuilder {
        CircuitBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.context.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.context.config
    }

    /// Execute a fallible operation with circuit breaker protection
    ///
    /// While the circuit is open and the cooldown has not elapsed the
    /// operation is not invoked and `CircuitError::Open` is returned.
    /// Otherwise the operation runs outside the breaker's lock and its
    /// error, if any, comes back unchanged inside `CircuitError::Execution`.
    pub fn call<T, E, F>(&self, operation: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let transition = self.admit()?;
        self.callbacks.dispatch(&self.context.name, transition);

        match operation() {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(e) => {
                self.on_failure();
                Err(CircuitError::Execution(e))
            }
        }
    }

    /// Count the call and decide whether it may run
    fn admit<E>(&self) -> Result<Option<Transition>, CircuitError<E>> {
        let mut core = self.core.lock();
        core.total_calls += 1;

        if core.state() != CircuitState::Open {
            return Ok(None);
        }

        if core.machine.attempt_reset() {
            core.last_state_change = self.context.clock.now();
            info!(
                circuit = %self.context.name,
                "circuit breaker OPEN -> HALF_OPEN (timeout expired)"
            );
            return Ok(Some(Transition {
                from: CircuitState::Open,
                to: CircuitState::HalfOpen,
            }));
        }

        core.total_rejections += 1;
        let opened_at = core.machine.opened_at().unwrap_or_default();
        let remaining = opened_at + self.context.config.timeout_secs - self.context.clock.now();

        Err(CircuitError::Open {
            circuit: self.context.name.clone(),
            retry_after: remaining.max(0.0),
            timeout: self.context.config.timeout_secs,
        })
    }

    fn on_success(&self) {
        let transition = {
            let mut core = self.core.lock();
            core.total_successes += 1;
            core.recent_results.push(true);

            match core.state() {
                CircuitState::HalfOpen => {
                    let successes = core.machine.record_trial_success();

                    if core.machine.close() {
                        self.context.failure_count.store(0, Ordering::SeqCst);
                        core.last_state_change = self.context.clock.now();
                        info!(
                            circuit = %self.context.name,
                            successes,
                            "circuit breaker HALF_OPEN -> CLOSED"
                        );
                        Some(Transition {
                            from: CircuitState::HalfOpen,
                            to: CircuitState::Closed,
                        })
                    } else {
                        None
                    }
                }
                CircuitState::Closed => {
                    self.context.failure_count.store(0, Ordering::SeqCst);
                    None
                }
                CircuitState::Open => None,
            }
        };

        self.callbacks.dispatch(&self.context.name, transition);
    }

    fn on_failure(&self) {
        let transition = {
            let mut core = self.core.lock();
            let now = self.context.clock.now();

            core.total_failures += 1;
            core.recent_results.push(false);
            let failures = self.context.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
            core.last_failure_time = Some(now);

            match core.state() {
                CircuitState::HalfOpen => {
                    if core.machine.trip(now) {
                        core.last_state_change = now;
                        warn!(
                            circuit = %self.context.name,
                            "circuit breaker HALF_OPEN -> OPEN (failure during recovery test)"
                        );
                        Some(Transition {
                            from: CircuitState::HalfOpen,
                            to: CircuitState::Open,
                        })
                    } else {
                        None
                    }
                }
                CircuitState::Closed => {
                    if core.machine.trip(now) {
                        core.last_state_change = now;
                        error!(
                            circuit = %self.context.name,
                            failures,
                            failure_rate = core.recent_results.failure_rate() * 100.0,
                            "circuit breaker CLOSED -> OPEN"
                        );
                        Some(Transition {
                            from: CircuitState::Closed,
                            to: CircuitState::Open,
                        })
                    } else {
                        None
                    }
                }
                // A concurrent trial call already reopened the circuit
                CircuitState::Open => {
                    core.machine.mark_open(now);
                    None
                }
            }
        };

        self.callbacks.dispatch(&self.context.name, transition);
    }

    /// Force the circuit closed and clear consecutive counters and the outcome window
    ///
    /// Cumulative totals survive a reset.
    pub fn reset(&self) {
        let transition = {
            let mut core = self.core.lock();
            let from = core.state();

            core.machine = BreakerMachine::new(self.context.clone());
            self.context.failure_count.store(0, Ordering::SeqCst);
            core.recent_results.clear();
            core.last_state_change = self.context.clock.now();

            info!(circuit = %self.context.name, "circuit breaker manual reset to CLOSED");
            (from != CircuitState::Closed).then_some(Transition {
                from,
                to: CircuitState::Closed,
            })
        };

        self.callbacks.dispatch(&self.context.name, transition);
    }

    pub fn get_state(&self) -> CircuitState {
        self.core.lock().state()
    }

    pub fn state_name(&self) -> &'static str {
        self.get_state().as_str()
    }

    pub fn is_open(&self) -> bool {
        self.get_state() == CircuitState::Open
    }

    pub fn is_closed(&self) -> bool {
        self.get_state() == CircuitState::Closed
    }

    pub fn is_half_open(&self) -> bool {
        self.get_state() == CircuitState::HalfOpen
    }

    /// Recent outcomes from oldest to newest (`true` = success)
    pub fn recent_results(&self) -> Vec<bool> {
        self.core.lock().recent_results.to_vec()
    }

    /// Failure fraction over the recent-outcome window, for diagnostics
    pub fn failure_rate(&self) -> f64 {
        self.core.lock().recent_results.failure_rate()
    }

    /// Point-in-time statistics snapshot
    pub fn get_statistics(&self) -> BreakerStatistics {
        let core = self.core.lock();
        let success_rate = if core.total_calls > 0 {
            core.total_successes as f64 / core.total_calls as f64 * 100.0
        } else {
            0.0
        };

        BreakerStatistics {
            name: self.context.name.clone(),
            state: core.state(),
            total_calls: core.total_calls,
            total_successes: core.total_successes,
            total_failures: core.total_failures,
            total_rejections: core.total_rejections,
            failure_count: self.context.failures(),
            success_count: core.machine.success_count(),
            success_rate,
            current_state_duration: self.context.clock.now() - core.last_state_change,
            last_failure_time: core.last_failure_time,
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("context", &self.context)
            .field("callbacks", &self.callbacks)
            .field("state", &self.get_state())
            .finish()
    }
}
