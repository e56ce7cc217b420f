//! Name-keyed registry of circuit breakers
//!
//! Breakers are created on first lookup and live as long as the manager.
//! The registry lock is never held while a breaker's own lock is taken:
//! bulk operations snapshot the registered breakers first.

use crate::{
    circuit::{BreakerConfig, CircuitBreaker},
    clock::{Clock, MonotonicClock},
    stats::BreakerStatistics,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};
use tracing::info;

static GLOBAL: OnceLock<CircuitBreakerManager> = OnceLock::new();

/// Registry of breakers keyed by dependency name
pub struct CircuitBreakerManager {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    clock: Arc<dyn Clock>,
}

impl CircuitBreakerManager {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(MonotonicClock::new()))
    }

    /// Manager whose breakers all read time from `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Process-wide manager, created on first use
    pub fn global() -> &'static CircuitBreakerManager {
        GLOBAL.get_or_init(CircuitBreakerManager::new)
    }

    /// Get or create the breaker for `name`
    ///
    /// Thresholds are only used when the breaker does not exist yet; later
    /// calls return the existing breaker unchanged. Other settings take
    /// their defaults.
    pub fn get_breaker(
        &self,
        name: &str,
        failure_threshold: usize,
        timeout_secs: f64,
    ) -> Arc<CircuitBreaker> {
        self.get_breaker_with(
            name,
            BreakerConfig {
                failure_threshold,
                timeout_secs,
                ..BreakerConfig::default()
            },
        )
    }

    /// Get or create the breaker for `name` with a full configuration (first writer wins)
    pub fn get_breaker_with(&self, name: &str, config: BreakerConfig) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().get(name) {
            return Arc::clone(breaker);
        }

        let mut breakers = self.breakers.write();
        let breaker = breakers.entry(name.to_string()).or_insert_with(|| {
            info!(circuit = name, "registering circuit breaker");
            Arc::new(
                CircuitBreaker::builder(name)
                    .config(config)
                    .clock(Arc::clone(&self.clock))
                    .build(),
            )
        });
        Arc::clone(breaker)
    }

    /// Look up a breaker without creating it
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.read().get(name).cloned()
    }

    /// Registered breaker names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.breakers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.read().is_empty()
    }

    /// Statistics for every registered breaker, keyed by name
    pub fn get_all_statistics(&self) -> BTreeMap<String, BreakerStatistics> {
        self.snapshot()
            .into_iter()
            .map(|breaker| (breaker.name().to_string(), breaker.get_statistics()))
            .collect()
    }

    /// Reset every registered breaker to CLOSED
    pub fn reset_all(&self) {
        let breakers = self.snapshot();
        info!(count = breakers.len(), "resetting all circuit breakers");
        for breaker in breakers {
            breaker.reset();
        }
    }

    fn snapshot(&self) -> Vec<Arc<CircuitBreaker>> {
        self.breakers.read().values().cloned().collect()
    }
}

impl std::fmt::Debug for CircuitBreakerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerManager")
            .field("breakers", &self.names())
            .field("clock", &self.clock)
            .finish()
    }
}

impl Default for CircuitBreakerManager {
    fn default() -> Self {
        Self::new()
    }
}
