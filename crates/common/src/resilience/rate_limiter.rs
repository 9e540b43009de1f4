//! Sliding-window rate limiting keyed by caller and endpoint
//!
//! Each `(actor, endpoint)` pair owns a fixed-duration window holding a
//! request count. A request inside a window that already reached
//! `max_requests` is rejected and recorded as a violation; an expired
//! window restarts with the rejected-then-retried request as its first.
//!
//! Counting happens behind the [`RateCounter`] abstraction so deployments
//! can swap the process-local map for a centralized store. The process-local
//! backend gives an approximate, not exact, global limit when horizontally
//! scaled.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use super::{Clock, SystemClock};

/// Configuration for the sliding-window limiter
#[derive(Debug, Clone)]
pub struct SlidingWindowConfig {
    /// Length of one counting window
    pub window: Duration,
    /// Maximum requests admitted per window
    pub max_requests: u64,
}

impl Default for SlidingWindowConfig {
    fn default() -> Self {
        Self { window: Duration::from_secs(60), max_requests: 100 }
    }
}

impl SlidingWindowConfig {
    /// Create a new configuration builder
    pub fn builder() -> SlidingWindowConfigBuilder {
        SlidingWindowConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.window.is_zero() {
            return Err("window must be greater than zero".to_string());
        }
        if self.max_requests == 0 {
            return Err("max_requests must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Builder for SlidingWindowConfig
#[derive(Debug)]
pub struct SlidingWindowConfigBuilder {
    config: SlidingWindowConfig,
}

impl Default for SlidingWindowConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SlidingWindowConfigBuilder {
    pub fn new() -> Self {
        Self { config: SlidingWindowConfig::default() }
    }

    pub fn window(mut self, window: Duration) -> Self {
        self.config.window = window;
        self
    }

    pub fn max_requests(mut self, max: u64) -> Self {
        self.config.max_requests = max;
        self
    }

    pub fn build(self) -> Result<SlidingWindowConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Key identifying one counted caller
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateKey {
    pub actor: String,
    pub endpoint: String,
}

impl RateKey {
    pub fn new(actor: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self { actor: actor.into(), endpoint: endpoint.into() }
    }
}

/// Outcome of one counting attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Admitted; `remaining` requests left in the current window
    Allowed { remaining: u64 },
    /// Rejected; the window resets after `retry_after`
    Rejected { retry_after: Duration },
}

/// Injectable counting backend
///
/// The limiter never touches counter state directly; single-instance
/// deployments use [`InMemoryRateCounter`], multi-instance deployments can
/// implement this against a centralized atomic counter store.
pub trait RateCounter: Send + Sync {
    /// Count one request for `key` at `now`, deciding admit/reject.
    fn check_and_increment(&self, key: &RateKey, now: Instant) -> RateDecision;

    /// Drop windows untouched for the retention period.
    ///
    /// Returns the number of evicted entries.
    fn evict_stale(&self, now: Instant) -> usize;
}

#[derive(Debug)]
struct WindowState {
    window_start: Instant,
    count: u64,
    last_seen: Instant,
}

/// Process-local counting backend
pub struct InMemoryRateCounter {
    config: SlidingWindowConfig,
    windows: Mutex<HashMap<RateKey, WindowState>>,
}

impl InMemoryRateCounter {
    pub fn new(config: SlidingWindowConfig) -> Result<Self, String> {
        config.validate()?;
        Ok(Self { config, windows: Mutex::new(HashMap::new()) })
    }

    /// Number of live window entries (for tests and introspection)
    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().len()
    }
}

impl RateCounter for InMemoryRateCounter {
    fn check_and_increment(&self, key: &RateKey, now: Instant) -> RateDecision {
        let mut windows = self.windows.lock();
        let state = windows
            .entry(key.clone())
            .or_insert_with(|| WindowState { window_start: now, count: 0, last_seen: now });

        state.last_seen = now;

        // Expired window restarts with this request as its first.
        if now.duration_since(state.window_start) >= self.config.window {
            state.window_start = now;
            state.count = 0;
        }

        if state.count >= self.config.max_requests {
            let elapsed = now.duration_since(state.window_start);
            let retry_after = self.config.window.saturating_sub(elapsed);
            return RateDecision::Rejected { retry_after };
        }

        state.count += 1;
        RateDecision::Allowed { remaining: self.config.max_requests - state.count }
    }

    fn evict_stale(&self, now: Instant) -> usize {
        // Entries idle for two full windows can no longer influence a
        // decision and are dropped.
        let retention = self.config.window * 2;
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, state| now.duration_since(state.last_seen) < retention);
        before - windows.len()
    }
}

/// Rate limiting errors
#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("rate limit exceeded for {actor} on {endpoint}; retry in {retry_after:?}")]
    Exceeded { actor: String, endpoint: String, retry_after: Duration },
}

/// Record of one rejected request
#[derive(Debug, Clone)]
pub struct RateLimitViolation {
    pub actor: String,
    pub endpoint: String,
    pub at: DateTime<Utc>,
}

/// Sliding-window rate limiter
///
/// # Examples
///
/// ```rust
/// use slotbook_common::resilience::{
///     InMemoryRateCounter, SlidingWindowConfig, SlidingWindowLimiter,
/// };
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let counter = InMemoryRateCounter::new(SlidingWindowConfig::default())?;
/// let limiter = SlidingWindowLimiter::new(counter);
///
/// limiter.check("client-42", "create_reservation")?;
/// # Ok(())
/// # }
/// ```
pub struct SlidingWindowLimiter<C: Clock = SystemClock> {
    counter: Arc<dyn RateCounter>,
    violations: Arc<Mutex<Vec<RateLimitViolation>>>,
    clock: Arc<C>,
}

impl SlidingWindowLimiter<SystemClock> {
    /// Create a limiter over the given backend with the system clock
    pub fn new<R: RateCounter + 'static>(counter: R) -> Self {
        Self::with_clock(counter, SystemClock)
    }
}

impl<C: Clock> SlidingWindowLimiter<C> {
    /// Create a limiter over the given backend with a custom clock
    pub fn with_clock<R: RateCounter + 'static>(counter: R, clock: C) -> Self {
        Self {
            counter: Arc::new(counter),
            violations: Arc::new(Mutex::new(Vec::new())),
            clock: Arc::new(clock),
        }
    }

    /// Admit or reject one request for `(actor, endpoint)`.
    ///
    /// Rejections are recorded as violations and logged.
    pub fn check(&self, actor: &str, endpoint: &str) -> Result<(), RateLimitError> {
        let key = RateKey::new(actor, endpoint);
        match self.counter.check_and_increment(&key, self.clock.now()) {
            RateDecision::Allowed { remaining } => {
                debug!(actor, endpoint, remaining, "request admitted");
                Ok(())
            }
            RateDecision::Rejected { retry_after } => {
                let at = DateTime::<Utc>::from(self.clock.system_time());
                warn!(actor, endpoint, retry_after_ms = retry_after.as_millis() as u64, "rate limit exceeded");
                self.violations.lock().push(RateLimitViolation {
                    actor: actor.to_string(),
                    endpoint: endpoint.to_string(),
                    at,
                });
                Err(RateLimitError::Exceeded {
                    actor: actor.to_string(),
                    endpoint: endpoint.to_string(),
                    retry_after,
                })
            }
        }
    }

    /// Drop counter windows untouched for the retention period.
    pub fn evict_stale(&self) -> usize {
        self.counter.evict_stale(self.clock.now())
    }

    /// Snapshot of recorded violations
    pub fn violations(&self) -> Vec<RateLimitViolation> {
        self.violations.lock().clone()
    }
}

impl<C: Clock> Clone for SlidingWindowLimiter<C> {
    fn clone(&self) -> Self {
        Self {
            counter: Arc::clone(&self.counter),
            violations: Arc::clone(&self.violations),
            clock: Arc::clone(&self.clock),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::MockClock;
    use super::*;

    fn limiter(
        window_secs: u64,
        max: u64,
    ) -> (SlidingWindowLimiter<MockClock>, MockClock) {
        let config = SlidingWindowConfig::builder()
            .window(Duration::from_secs(window_secs))
            .max_requests(max)
            .build()
            .unwrap();
        let clock = MockClock::new();
        let counter = InMemoryRateCounter::new(config).unwrap();
        (SlidingWindowLimiter::with_clock(counter, clock.clone()), clock)
    }

    #[test]
    fn admits_up_to_the_limit_then_rejects() {
        let (limiter, _clock) = limiter(60, 100);

        for _ in 0..100 {
            assert!(limiter.check("actor-1", "create_reservation").is_ok());
        }

        let err = limiter.check("actor-1", "create_reservation").unwrap_err();
        assert!(matches!(err, RateLimitError::Exceeded { .. }));

        let violations = limiter.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].actor, "actor-1");
        assert_eq!(violations[0].endpoint, "create_reservation");
    }

    #[test]
    fn a_new_window_admits_again() {
        let (limiter, clock) = limiter(60, 2);

        assert!(limiter.check("a", "ep").is_ok());
        assert!(limiter.check("a", "ep").is_ok());
        assert!(limiter.check("a", "ep").is_err());

        clock.advance_secs(61);
        assert!(limiter.check("a", "ep").is_ok());
    }

    #[test]
    fn keys_are_counted_independently() {
        let (limiter, _clock) = limiter(60, 1);

        assert!(limiter.check("a", "ep").is_ok());
        assert!(limiter.check("b", "ep").is_ok());
        assert!(limiter.check("a", "other").is_ok());
        assert!(limiter.check("a", "ep").is_err());
    }

    #[test]
    fn stale_windows_are_evicted_after_two_periods() {
        let config = SlidingWindowConfig::builder()
            .window(Duration::from_secs(60))
            .max_requests(5)
            .build()
            .unwrap();
        let clock = MockClock::new();
        let counter = InMemoryRateCounter::new(config).unwrap();
        let limiter = SlidingWindowLimiter::with_clock(counter, clock.clone());

        assert!(limiter.check("a", "ep").is_ok());
        assert!(limiter.check("b", "ep").is_ok());

        clock.advance_secs(90);
        assert!(limiter.check("a", "ep").is_ok()); // refreshes a only
        assert_eq!(limiter.evict_stale(), 0); // both still within 2 windows

        clock.advance_secs(121);
        assert_eq!(limiter.evict_stale(), 2); // a idle 121s, b idle 211s
    }

    #[test]
    fn rejected_requests_report_retry_after() {
        let (limiter, clock) = limiter(60, 1);

        assert!(limiter.check("a", "ep").is_ok());
        clock.advance_secs(20);
        match limiter.check("a", "ep").unwrap_err() {
            RateLimitError::Exceeded { retry_after, .. } => {
                assert_eq!(retry_after, Duration::from_secs(40));
            }
        }
    }

    #[test]
    fn config_validation_rejects_zero_values() {
        assert!(SlidingWindowConfig::builder().max_requests(0).build().is_err());
        assert!(SlidingWindowConfig::builder().window(Duration::ZERO).build().is_err());
    }
}
