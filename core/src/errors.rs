//! Error types for circuit breaker and rate limiter operations

use thiserror::Error;

/// Errors returned by [`CircuitBreaker::call`](crate::CircuitBreaker::call)
#[derive(Debug, Error)]
pub enum CircuitError<E> {
    /// Circuit is open, the operation was not attempted
    #[error(
        "circuit breaker '{circuit}' is open, service unavailable (retry after {retry_after:.2}s, cooldown {timeout}s)"
    )]
    Open {
        circuit: String,
        /// Seconds left before the breaker admits a trial call
        retry_after: f64,
        /// Configured cooldown in seconds
        timeout: f64,
    },
    /// The wrapped operation failed; its error is passed through untouched
    #[error(transparent)]
    Execution(E),
}

impl<E> CircuitError<E> {
    /// True when the call was rejected without running the operation
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitError::Open { .. })
    }

    /// The operation's own error, if the operation ran and failed
    pub fn into_execution(self) -> Option<E> {
        match self {
            CircuitError::Execution(e) => Some(e),
            CircuitError::Open { .. } => None,
        }
    }

    /// Seconds until a trial call is admitted, for rejections
    pub fn retry_after(&self) -> Option<f64> {
        match self {
            CircuitError::Open { retry_after, .. } => Some(*retry_after),
            CircuitError::Execution(_) => None,
        }
    }
}

/// Invalid configuration values
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("{field} must be a finite, non-negative number of seconds (got {value})")]
    InvalidDuration { field: &'static str, value: f64 },
    #[error("safety_margin must be within (0, 1] (got {0})")]
    SafetyMargin(f64),
}

/// A usage header value that could not be interpreted as an integer weight
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid weight header value: {value:?}")]
pub struct UsageParseError {
    pub value: String,
}
