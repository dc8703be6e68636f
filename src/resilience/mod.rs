//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Server, inbound call:
//!     → rate_limit.rs (one shared token bucket; reject with `rate_limit` before decode)
//!     → domain service
//!         → timeouts.rs (deadline on every repository call)
//!
//! Client, outbound call:
//!     → circuit_breaker.rs (fail fast while open; count only `rate_limit`/`internal`)
//!     → transport (deadline on every round trip)
//! ```
//!
//! # Design Decisions
//! - Limiter and breakers are explicit objects shared by `Arc`, never globals
//! - Business outcomes (`invalid`, `conflict`, ...) never trip a breaker
//! - Nothing here retries; retry policy belongs to callers outside the breaker

pub mod circuit_breaker;
pub mod rate_limit;
pub mod timeouts;

pub use circuit_breaker::{BreakerError, BreakerState, CircuitBreaker};
pub use rate_limit::RateLimiter;
