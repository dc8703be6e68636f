//! Process-wide request rate limiting.
//!
//! One token bucket is shared by every endpoint of every transport. Each inbound call
//! takes a token before it is decoded; an empty bucket rejects the call with
//! `rate_limit` and nothing below the limiter runs.

use std::sync::Mutex;
use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::domain::Error;

/// A simple token bucket rate limiter.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Shared request budget for one process.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
    capacity: f64,
    refill_rate: f64,
}

impl RateLimiter {
    /// Create a limiter refilling `requests_per_second` tokens per second, holding at
    /// most `burst_size`. The bucket starts full.
    pub fn new(requests_per_second: u32, burst_size: u32) -> Self {
        let capacity = f64::from(burst_size);
        Self {
            bucket: Mutex::new(TokenBucket::new(capacity)),
            capacity,
            refill_rate: f64::from(requests_per_second),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.requests_per_second, config.burst_size)
    }

    /// Take one token. Returns false when the budget is exhausted.
    pub fn try_acquire(&self) -> bool {
        let mut bucket = match self.bucket.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        bucket.try_acquire(self.capacity, self.refill_rate)
    }

    /// Take one token or fail with `rate_limit`.
    pub fn check(&self) -> Result<(), Error> {
        if self.try_acquire() {
            Ok(())
        } else {
            Err(Error::rate_limit())
        }
    }
}
