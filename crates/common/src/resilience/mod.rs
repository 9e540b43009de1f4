//! Resilience patterns for protecting shared resources
//!
//! This module provides the request-limiting primitives used at the edges of
//! the system:
//! - **Sliding window**: bounds request counts per caller within a fixed
//!   time bucket
//! - **Clock abstraction**: allows deterministic tests via `MockClock`
//!
//! The counting backend is injectable (see [`RateCounter`]) so a
//! single-instance deployment can use the process-local map while a
//! multi-instance deployment can plug in a centralized counter store.

pub mod clock;
pub mod rate_limiter;

pub use clock::{Clock, MockClock, SystemClock};
pub use rate_limiter::{
    InMemoryRateCounter, RateCounter, RateDecision, RateKey, RateLimitError, RateLimitViolation,
    SlidingWindowConfig, SlidingWindowConfigBuilder, SlidingWindowLimiter,
};
