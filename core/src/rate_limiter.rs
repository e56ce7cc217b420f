//! Weighted sliding-window rate limiter
//!
//! Tracks request weight spent inside a trailing window and blocks callers
//! that would push usage past `weight_limit * safety_margin`. The remote
//! API's own accounting (the `X-MBX-USED-WEIGHT-1M` response header) can be
//! folded back in with [`RateLimiter::update_from_response`], which only
//! ever raises the locally tracked usage.
//!
//! Every operation runs under one mutex, including the blocking wait in
//! [`RateLimiter::wait_if_needed`]: while one caller sleeps, all other
//! admission checks queue behind it.

use crate::{
    clock::{Clock, MonotonicClock},
    errors::{ConfigError, UsageParseError},
    stats::RateLimitStatistics,
};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Response header carrying the server-side weight used in the last minute
pub const USED_WEIGHT_HEADER: &str = "X-MBX-USED-WEIGHT-1M";

/// Fraction of `weight_limit` above which reported usage is logged as critical
const CRITICAL_USAGE_RATIO: f64 = 0.9;

static GLOBAL: OnceLock<RateLimiter> = OnceLock::new();

/// Rate limiter configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum weight the remote API accepts per window
    pub weight_limit: u64,
    /// Length of the sliding window in seconds
    pub window_secs: f64,
    /// Fraction of `weight_limit` this process allows itself to use
    pub safety_margin: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            weight_limit: 2400,
            window_secs: 60.0,
            safety_margin: 0.8,
        }
    }
}

impl RateLimitConfig {
    /// `floor(weight_limit * safety_margin)`
    pub fn effective_limit(&self) -> u64 {
        (self.weight_limit as f64 * self.safety_margin).floor().max(0.0) as u64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.weight_limit == 0 {
            return Err(ConfigError::Zero {
                field: "weight_limit",
            });
        }
        if self.window_secs <= 0.0 || Duration::try_from_secs_f64(self.window_secs).is_err() {
            return Err(ConfigError::InvalidDuration {
                field: "window_secs",
                value: self.window_secs,
            });
        }
        if !(self.safety_margin > 0.0 && self.safety_margin <= 1.0) {
            return Err(ConfigError::SafetyMargin(self.safety_margin));
        }
        Ok(())
    }
}

/// Parse a usage header value into a weight
pub fn parse_usage(value: &str) -> Result<u64, UsageParseError> {
    value.trim().parse::<u64>().map_err(|_| UsageParseError {
        value: value.to_string(),
    })
}

#[derive(Debug, Default)]
struct LimiterState {
    /// `(timestamp, weight)` pairs, oldest first
    weight_history: VecDeque<(f64, u64)>,
    total_requests: u64,
    total_weight_used: u64,
    wait_count: u64,
    total_wait_time: f64,
}

impl LimiterState {
    fn prune(&mut self, now: f64, window_secs: f64) {
        let cutoff = now - window_secs;
        while self
            .weight_history
            .front()
            .is_some_and(|(timestamp, _)| *timestamp < cutoff)
        {
            self.weight_history.pop_front();
        }
    }

    fn current_weight(&mut self, now: f64, window_secs: f64) -> u64 {
        self.prune(now, window_secs);
        self.weight_history
            .iter()
            .fold(0u64, |total, (_, weight)| total.saturating_add(*weight))
    }
}

/// Weighted sliding-window rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    effective_limit: u64,
    clock: Arc<dyn Clock>,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    /// Create a limiter on the monotonic clock
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        let effective_limit = config.effective_limit();

        info!(
            effective_limit,
            weight_limit = config.weight_limit,
            window_secs = config.window_secs,
            "rate limiter initialized"
        );

        Self {
            config,
            effective_limit,
            clock,
            state: Mutex::new(LimiterState::default()),
        }
    }

    /// Process-wide limiter with default limits, created on first use
    pub fn global() -> &'static RateLimiter {
        GLOBAL.get_or_init(|| RateLimiter::new(RateLimitConfig::default()))
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn effective_limit(&self) -> u64 {
        self.effective_limit
    }

    /// Block until a request of `weight` fits the budget, then record it
    ///
    /// Waits at most once, until the oldest tracked entry leaves the window;
    /// capacity is not rechecked afterwards. Returns the seconds waited.
    pub fn wait_if_needed(&self, weight: u64) -> f64 {
        let window_secs = self.config.window_secs;
        let mut state = self.state.lock();
        let mut now = self.clock.now();
        let current_weight = state.current_weight(now, window_secs);
        let mut waited = 0.0;

        if current_weight.saturating_add(weight) > self.effective_limit
            && let Some(&(oldest, _)) = state.weight_history.front()
        {
            let wait_time = oldest + window_secs - now;
            if wait_time > 0.0 {
                state.wait_count += 1;
                state.total_wait_time += wait_time;

                warn!(
                    current_weight,
                    effective_limit = self.effective_limit,
                    weight,
                    wait_secs = wait_time,
                    "rate limit approaching, waiting"
                );

                // Sleeps with the limiter lock held
                self.clock.sleep(wait_time);
                now = self.clock.now();
                state.prune(now, window_secs);
                waited = wait_time;
            }
        }

        state.weight_history.push_back((now, weight));
        state.total_requests += 1;
        state.total_weight_used = state.total_weight_used.saturating_add(weight);

        waited
    }

    /// Reconcile with a usage header value reported by the remote API
    ///
    /// Malformed values are logged and ignored.
    pub fn update_from_response(&self, usage: &str) {
        match parse_usage(usage) {
            Ok(server_weight) => self.reconcile(server_weight),
            Err(e) => warn!(error = %e, "ignoring usage header"),
        }
    }

    /// Find the used-weight header among response headers and reconcile with it
    ///
    /// Header names match case-insensitively; a missing or empty header is a no-op.
    pub fn update_from_headers<I, K, V>(&self, headers: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let value = headers
            .into_iter()
            .find(|(name, _)| name.as_ref().eq_ignore_ascii_case(USED_WEIGHT_HEADER))
            .map(|(_, value)| value);

        if let Some(value) = value
            && !value.as_ref().is_empty()
        {
            self.update_from_response(value.as_ref());
        }
    }

    /// Raise tracked usage to at least `server_weight`; never lowers it
    pub fn reconcile(&self, server_weight: u64) {
        {
            let mut state = self.state.lock();
            let now = self.clock.now();
            let current_weight = state.current_weight(now, self.config.window_secs);

            if server_weight > current_weight {
                let diff = server_weight - current_weight;
                debug!(
                    diff,
                    server = server_weight,
                    local = current_weight,
                    "adjusting weight tracking"
                );
                state.weight_history.push_back((now, diff));
            }
        }

        if server_weight as f64 > self.config.weight_limit as f64 * CRITICAL_USAGE_RATIO {
            warn!(
                used = server_weight,
                weight_limit = self.config.weight_limit,
                "rate limit critical"
            );
        } else if server_weight > self.effective_limit {
            warn!(
                used = server_weight,
                weight_limit = self.config.weight_limit,
                "rate limit high"
            );
        }
    }

    /// Weight currently inside the window
    pub fn current_weight(&self) -> u64 {
        let now = self.clock.now();
        self.state
            .lock()
            .current_weight(now, self.config.window_secs)
    }

    /// Number of tracked `(timestamp, weight)` entries after pruning
    pub fn history_len(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.prune(now, self.config.window_secs);
        state.weight_history.len()
    }

    pub fn get_statistics(&self) -> RateLimitStatistics {
        let mut state = self.state.lock();
        let now = self.clock.now();
        let current_weight = state.current_weight(now, self.config.window_secs);

        let utilization = if self.effective_limit > 0 {
            current_weight as f64 / self.effective_limit as f64 * 100.0
        } else {
            0.0
        };
        let avg_wait_time = if state.wait_count > 0 {
            state.total_wait_time / state.wait_count as f64
        } else {
            0.0
        };

        RateLimitStatistics {
            total_requests: state.total_requests,
            total_weight_used: state.total_weight_used,
            current_weight,
            weight_limit: self.config.weight_limit,
            effective_limit: self.effective_limit,
            utilization,
            wait_count: state.wait_count,
            total_wait_time: state.total_wait_time,
            avg_wait_time,
        }
    }

    /// Zero the counters; tracked weight keeps aging out on its own
    pub fn reset_statistics(&self) {
        let mut state = self.state.lock();
        state.total_requests = 0;
        state.total_weight_used = 0;
        state.wait_count = 0;
        state.total_wait_time = 0.0;
    }
}
