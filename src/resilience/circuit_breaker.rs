//! Circuit breaker for remote calls.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: remote service assumed down, requests fail fast
//! - Half-Open: testing if the remote service recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= threshold (optionally within a window)
//! Open → Half-Open: first call after the open timeout
//! Half-Open → Closed: trial call succeeds
//! Half-Open → Open: trial call fails
//! ```
//!
//! # Design Decisions
//! - One breaker per client operation, not global
//! - The caller decides which outcomes are failures
//! - Single trial in Half-Open (prevents hammering a recovering server)
//! - Results from calls admitted in an earlier generation are ignored

use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

/// Outcome of a call made through a breaker.
#[derive(Debug)]
pub enum BreakerError<E> {
    /// The breaker rejected the call without running it.
    Open { name: &'static str },
    /// The call ran and failed.
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for BreakerError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakerError::Open { .. } => f.write_str("circuit breaker is open"),
            BreakerError::Inner(e) => e.fmt(f),
        }
    }
}

impl<E> std::error::Error for BreakerError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BreakerError::Open { .. } => None,
            BreakerError::Inner(e) => Some(e),
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    generation: u64,
    consecutive_failures: u32,
    window_start: Instant,
    opened_at: Instant,
    trial_in_flight: bool,
}

/// A per-operation circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: &'static str,
    failure_threshold: u32,
    open_timeout: Duration,
    window: Option<Duration>,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, config: &CircuitBreakerConfig) -> Self {
        let now = Instant::now();
        Self {
            name,
            failure_threshold: config.failure_threshold.max(1),
            open_timeout: Duration::from_secs(config.open_timeout_secs),
            window: (config.window_secs > 0).then(|| Duration::from_secs(config.window_secs)),
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                generation: 0,
                consecutive_failures: 0,
                window_start: now,
                opened_at: now,
                trial_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current state, advancing Open to Half-Open if the timeout has passed.
    pub fn state(&self) -> BreakerState {
        let mut inner = self.lock();
        self.refresh(&mut inner, Instant::now());
        inner.state
    }

    /// Run `call` unless the breaker is open.
    ///
    /// `is_failure` decides whether an error counts against the breaker; errors it
    /// rejects are passed through and count as successes.
    pub async fn call<T, E, Fut>(
        &self,
        call: Fut,
        is_failure: impl FnOnce(&E) -> bool,
    ) -> Result<T, BreakerError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        let mut permit = self.admit().ok_or(BreakerError::Open { name: self.name })?;

        let result = call.await;
        let failed = match &result {
            Ok(_) => false,
            Err(e) => is_failure(e),
        };
        permit.complete(failed);

        result.map_err(BreakerError::Inner)
    }

    fn admit(&self) -> Option<Permit<'_>> {
        let mut inner = self.lock();
        let now = Instant::now();
        self.refresh(&mut inner, now);

        match inner.state {
            BreakerState::Closed => {}
            BreakerState::Open => return None,
            BreakerState::HalfOpen => {
                if inner.trial_in_flight {
                    return None;
                }
                inner.trial_in_flight = true;
            }
        }

        Some(Permit {
            breaker: self,
            generation: inner.generation,
            completed: false,
        })
    }

    fn on_result(&self, generation: u64, failed: bool) {
        let mut inner = self.lock();
        if inner.generation != generation {
            return;
        }
        let now = Instant::now();

        match inner.state {
            BreakerState::Closed => {
                if failed {
                    inner.consecutive_failures += 1;
                    if inner.consecutive_failures >= self.failure_threshold {
                        self.transition(&mut inner, BreakerState::Open, now);
                    }
                } else {
                    inner.consecutive_failures = 0;
                }
            }
            BreakerState::HalfOpen => {
                let next = if failed {
                    BreakerState::Open
                } else {
                    BreakerState::Closed
                };
                self.transition(&mut inner, next, now);
            }
            BreakerState::Open => {}
        }
    }

    fn refresh(&self, inner: &mut Inner, now: Instant) {
        match inner.state {
            BreakerState::Closed => {
                if let Some(window) = self.window {
                    if now.duration_since(inner.window_start) >= window {
                        inner.consecutive_failures = 0;
                        inner.window_start = now;
                    }
                }
            }
            BreakerState::Open => {
                if now.duration_since(inner.opened_at) >= self.open_timeout {
                    self.transition(inner, BreakerState::HalfOpen, now);
                }
            }
            BreakerState::HalfOpen => {}
        }
    }

    fn transition(&self, inner: &mut Inner, to: BreakerState, now: Instant) {
        let from = inner.state;
        inner.state = to;
        inner.generation += 1;
        inner.consecutive_failures = 0;
        inner.trial_in_flight = false;
        inner.window_start = now;
        if to == BreakerState::Open {
            inner.opened_at = now;
        }

        tracing::warn!(
            breaker = self.name,
            from = from.as_str(),
            to = to.as_str(),
            "Circuit breaker state changed"
        );
        metrics::record_breaker_transition(self.name, to);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Admission to run one call. A permit dropped before completion (the call was
/// cancelled) counts as a failure.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    completed: bool,
}

impl Permit<'_> {
    fn complete(&mut self, failed: bool) {
        self.completed = true;
        self.breaker.on_result(self.generation, failed);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.breaker.on_result(self.generation, true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn breaker(threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new(
            "CreateUser",
            &CircuitBreakerConfig {
                failure_threshold: threshold,
                open_timeout_secs: 60,
                window_secs: 0,
            },
        )
    }

    type Outcome = Result<(), BreakerError<&'static str>>;

    async fn fail(cb: &CircuitBreaker, calls: &AtomicU32) -> Outcome {
        cb.call(
            async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("internal")
            },
            |_| true,
        )
        .await
    }

    async fn succeed(cb: &CircuitBreaker, calls: &AtomicU32) -> Outcome {
        cb.call(
            async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            |_: &&'static str| true,
        )
        .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_threshold() {
        let cb = breaker(5);
        let calls = AtomicU32::new(0);

        for _ in 0..4 {
            assert!(matches!(fail(&cb, &calls).await, Err(BreakerError::Inner(_))));
            assert_eq!(cb.state(), BreakerState::Closed);
        }
        assert!(matches!(fail(&cb, &calls).await, Err(BreakerError::Inner(_))));
        assert_eq!(cb.state(), BreakerState::Open);

        let result = fail(&cb, &calls).await;
        assert!(matches!(result, Err(BreakerError::Open { name: "CreateUser" })));
        assert_eq!(calls.load(Ordering::SeqCst), 5, "open breaker must not run the call");
    }

    #[tokio::test(start_paused = true)]
    async fn test_uncounted_errors_never_trip() {
        let cb = breaker(2);
        for _ in 0..20 {
            let result: Result<(), _> = cb.call(async { Err("conflict") }, |_| false).await;
            assert!(matches!(result, Err(BreakerError::Inner("conflict"))));
        }
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_consecutive_failures() {
        let cb = breaker(3);
        let calls = AtomicU32::new(0);
        for _ in 0..10 {
            let _ = fail(&cb, &calls).await;
            let _ = fail(&cb, &calls).await;
            succeed(&cb, &calls).await.unwrap();
        }
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_trial_success_closes() {
        let cb = breaker(1);
        let calls = AtomicU32::new(0);
        let _ = fail(&cb, &calls).await;
        assert_eq!(cb.state(), BreakerState::Open);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cb.state(), BreakerState::HalfOpen);

        succeed(&cb, &calls).await.unwrap();
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_trial_failure_reopens() {
        let cb = breaker(1);
        let calls = AtomicU32::new(0);
        let _ = fail(&cb, &calls).await;

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(matches!(fail(&cb, &calls).await, Err(BreakerError::Inner(_))));
        assert_eq!(cb.state(), BreakerState::Open);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(matches!(fail(&cb, &calls).await, Err(BreakerError::Open { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_admits_single_trial() {
        let cb = breaker(1);
        let calls = AtomicU32::new(0);
        let _ = fail(&cb, &calls).await;
        tokio::time::advance(Duration::from_secs(61)).await;

        let trial = cb.call(
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, &'static str>(())
            },
            |_| true,
        );
        let concurrent = async {
            tokio::task::yield_now().await;
            succeed(&cb, &calls).await
        };
        let (trial, concurrent) = tokio::join!(trial, concurrent);

        assert!(trial.is_ok());
        assert!(matches!(concurrent, Err(BreakerError::Open { .. })));
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_forgets_old_failures() {
        let cb = CircuitBreaker::new(
            "FindUserByID",
            &CircuitBreakerConfig {
                failure_threshold: 3,
                open_timeout_secs: 60,
                window_secs: 10,
            },
        );
        let calls = AtomicU32::new(0);
        let _ = fail(&cb, &calls).await;
        let _ = fail(&cb, &calls).await;

        tokio::time::advance(Duration::from_secs(11)).await;
        let _ = fail(&cb, &calls).await;
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_trial_reopens() {
        let cb = breaker(1);
        let calls = AtomicU32::new(0);
        let _ = fail(&cb, &calls).await;
        tokio::time::advance(Duration::from_secs(61)).await;

        let slow = cb.call(
            async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, &'static str>(())
            },
            |_| true,
        );
        let timed_out = tokio::time::timeout(Duration::from_millis(10), slow).await;
        assert!(timed_out.is_err());
        assert_eq!(cb.state(), BreakerState::Open);
    }
}
