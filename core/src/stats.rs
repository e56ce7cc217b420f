//! Point-in-time statistics snapshots
//!
//! Polled by dashboards and metrics exporters; both types serialize to flat
//! JSON objects.

use crate::circuit::CircuitState;
use serde::Serialize;

/// Snapshot of a single circuit breaker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerStatistics {
    pub name: String,
    pub state: CircuitState,
    pub total_calls: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_rejections: u64,
    /// Consecutive failures
    pub failure_count: usize,
    /// Consecutive trial successes while half-open
    pub success_count: usize,
    /// Percentage of calls that succeeded (0-100)
    pub success_rate: f64,
    /// Seconds since the last state change or reset
    pub current_state_duration: f64,
    /// Clock reading of the most recent failure
    pub last_failure_time: Option<f64>,
}

/// Snapshot of a rate limiter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateLimitStatistics {
    pub total_requests: u64,
    pub total_weight_used: u64,
    /// Weight inside the trailing window
    pub current_weight: u64,
    pub weight_limit: u64,
    pub effective_limit: u64,
    /// `current_weight` as a percentage of `effective_limit`
    pub utilization: f64,
    pub wait_count: u64,
    pub total_wait_time: f64,
    pub avg_wait_time: f64,
}
