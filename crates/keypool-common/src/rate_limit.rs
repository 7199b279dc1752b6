//! Rate Limiting for keypool
//!
//! This module provides the client-side token bucket that throttles how
//! fast a pool issues dispatches.
//!
//! # Architecture
//!
//! Limiting is optional and configured per pool:
//! - **Disabled** (`capacity = -1`): no limiter is constructed at all
//! - **Token bucket**: `capacity` tokens, one token added back every
//!   `interval_ms`, bucket starts full
//!
//! Refill is lazy. The bucket records when it last refilled and tops itself
//! up on the next acquisition, so an idle limiter owns no timers.
//!
//! # Fairness
//!
//! Waiters queue on a fair async mutex that is held across the wait for the
//! next token. The first caller to block is the first caller served.
//!
//! # Example
//!
//! ```
//! use keypool_common::rate_limit::{RateLimitConfig, RateLimiter};
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let limiter = RateLimiter::new(RateLimitConfig::new(2, 200)).unwrap();
//! let never = CancellationToken::new();
//!
//! // The bucket starts full
//! limiter.acquire(&never).await.unwrap();
//! limiter.acquire(&never).await.unwrap();
//! assert!(!limiter.try_acquire());
//! # });
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Configuration for the token bucket.
///
/// # Example
///
/// ```
/// use keypool_common::rate_limit::RateLimitConfig;
///
/// let config = RateLimitConfig::default();
/// assert_eq!(config.capacity, 50);
/// assert_eq!(config.interval_ms, 200);
/// assert!(RateLimitConfig::disabled().is_disabled());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Burst size, or [`DISABLED_CAPACITY`](Self::DISABLED_CAPACITY)
    pub capacity: i64,
    /// One token is added back per interval
    pub interval_ms: u64,
}

impl RateLimitConfig {
    /// Capacity value that turns limiting off.
    pub const DISABLED_CAPACITY: i64 = -1;

    pub fn new(capacity: i64, interval_ms: u64) -> Self {
        Self { capacity, interval_ms }
    }

    pub fn disabled() -> Self {
        Self {
            capacity: Self::DISABLED_CAPACITY,
            ..Self::default()
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.capacity == Self::DISABLED_CAPACITY
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Checks the values a limiter can actually run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.is_disabled() {
            return Ok(());
        }
        if self.capacity <= 0 {
            return Err(format!(
                "rate_limit.capacity must be positive or {} to disable, got {}",
                Self::DISABLED_CAPACITY,
                self.capacity
            ));
        }
        if self.capacity > u32::MAX as i64 {
            return Err(format!("rate_limit.capacity {} is too large", self.capacity));
        }
        if self.interval_ms == 0 {
            return Err("rate_limit.interval_ms must be positive".to_string());
        }
        Ok(())
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 50,
            interval_ms: 200,
        }
    }
}

/// Why [`RateLimiter::acquire`] returned without a token.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireError {
    #[error("token acquisition was cancelled")]
    Cancelled,

    #[error("rate limiter has been closed")]
    Closed,
}

#[derive(Debug)]
struct TokenBucket {
    tokens: u32,
    last_refill: Instant,
}

impl TokenBucket {
    fn full(capacity: u32, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
        }
    }

    /// Adds one token per whole interval elapsed, up to `capacity`.
    fn refill(&mut self, now: Instant, capacity: u32, interval: Duration) {
        // A full bucket banks no time toward the next token
        if self.tokens >= capacity {
            self.last_refill = now;
            return;
        }

        let elapsed = now.saturating_duration_since(self.last_refill);
        let whole = (elapsed.as_nanos() / interval.as_nanos()).min(u32::MAX as u128) as u32;
        if whole == 0 {
            return;
        }

        self.tokens = self.tokens.saturating_add(whole).min(capacity);
        if self.tokens == capacity {
            self.last_refill = now;
        } else {
            // Keep the partial interval already elapsed
            self.last_refill += interval * whole;
        }
    }

    fn take(&mut self) -> bool {
        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    fn time_until_next_token(&self, now: Instant, interval: Duration) -> Duration {
        (self.last_refill + interval).saturating_duration_since(now)
    }
}

/// Token-bucket limiter shared by every dispatch of one pool.
///
/// # Thread Safety
///
/// All methods take `&self`; wrap the limiter in an `Arc` or keep it inside
/// a shared owner to use it from many tasks.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    capacity: u32,
    interval: Duration,
    bucket: Mutex<TokenBucket>,
    closed: CancellationToken,
}

impl RateLimiter {
    /// Builds a limiter, or `None` when `config` disables limiting.
    ///
    /// Out-of-range values are clamped: capacity to at least one token,
    /// interval to at least one millisecond.
    pub fn new(config: RateLimitConfig) -> Option<Self> {
        if config.is_disabled() {
            return None;
        }

        let capacity = config.capacity.clamp(1, u32::MAX as i64) as u32;
        let interval = Duration::from_millis(config.interval_ms.max(1));

        Some(Self {
            config,
            capacity,
            interval,
            bucket: Mutex::new(TokenBucket::full(capacity, Instant::now())),
            closed: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Waits for a token.
    ///
    /// Returns [`AcquireError::Cancelled`] once `cancel` fires and
    /// [`AcquireError::Closed`] once the limiter is closed, whether the
    /// caller was queued, waiting for a refill, or arrived afterwards.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), AcquireError> {
        if self.is_closed() {
            return Err(AcquireError::Closed);
        }

        let mut bucket = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return Err(AcquireError::Closed),
            _ = cancel.cancelled() => return Err(AcquireError::Cancelled),
            guard = self.bucket.lock() => guard,
        };

        loop {
            let now = Instant::now();
            bucket.refill(now, self.capacity, self.interval);
            if bucket.take() {
                return Ok(());
            }

            let wait = bucket.time_until_next_token(now, self.interval);
            tokio::select! {
                biased;
                _ = self.closed.cancelled() => return Err(AcquireError::Closed),
                _ = cancel.cancelled() => return Err(AcquireError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Takes a token without waiting.
    ///
    /// Fails when the bucket is empty, the limiter is closed, or another
    /// caller is already queued.
    pub fn try_acquire(&self) -> bool {
        if self.is_closed() {
            return false;
        }
        match self.bucket.try_lock() {
            Ok(mut bucket) => {
                bucket.refill(Instant::now(), self.capacity, self.interval);
                bucket.take()
            }
            Err(_) => false,
        }
    }

    /// Tokens available right now. Waits behind queued callers.
    pub async fn available_tokens(&self) -> u32 {
        let mut bucket = self.bucket.lock().await;
        bucket.refill(Instant::now(), self.capacity, self.interval);
        bucket.tokens
    }

    /// Fails every queued and future [`acquire`](Self::acquire).
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}
