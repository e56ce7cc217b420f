//! QuotaGuard - circuit breakers and weighted rate limiting for remote API clients
//!
//! This crate provides two independent protections for code that talks to
//! rate-limited, occasionally failing services:
//! - Per-dependency circuit breakers (Closed → Open → HalfOpen) built on a state machine
//! - A registry that hands out one shared breaker per dependency name
//! - A weighted sliding-window rate limiter that reconciles with server-reported usage
//! - Injectable clocks so cooldowns and waits can be driven deterministically
//!
//! # Example
//!
//! ```rust
//! use quota_guard::{CircuitBreaker, RateLimitConfig, RateLimiter};
//!
//! let circuit = CircuitBreaker::builder("exchange_api")
//!     .failure_threshold(5)
//!     .success_threshold(2)
//!     .timeout_secs(60.0)
//!     .on_open(|name| println!("Circuit {} opened!", name))
//!     .build();
//!
//! let limiter = RateLimiter::new(RateLimitConfig::default());
//!
//! // Spend request weight, then execute with circuit protection
//! limiter.wait_if_needed(10);
//! let result = circuit.call(|| {
//!     // Your service call here
//!     Ok::<_, String>("ticker")
//! });
//! assert!(result.is_ok());
//!
//! // Fold the server's own accounting back in
//! limiter.update_from_headers([("X-MBX-USED-WEIGHT-1M", "42")]);
//! assert_eq!(limiter.current_weight(), 42);
//! ```

pub mod builder;
pub mod callbacks;
pub mod circuit;
pub mod clock;
pub mod errors;
mod machine;
pub mod manager;
pub mod outcomes;
pub mod rate_limiter;
pub mod stats;

pub use builder::CircuitBuilder;
pub use callbacks::Callbacks;
pub use circuit::{BreakerConfig, CircuitBreaker, CircuitState};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use errors::{CircuitError, ConfigError, UsageParseError};
pub use manager::CircuitBreakerManager;
pub use outcomes::OutcomeWindow;
pub use rate_limiter::{RateLimitConfig, RateLimiter, USED_WEIGHT_HEADER};
pub use stats::{BreakerStatistics, RateLimitStatistics};
