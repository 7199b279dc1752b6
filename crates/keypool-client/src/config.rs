use std::time::Duration;

use keypool_common::rate_limit::RateLimitConfig;
use keypool_common::{Encoding, PoolError, Result};
use serde::{Deserialize, Serialize};

/// Client pool configuration.
///
/// Every field has a default, so a JSON document only needs the values it
/// changes.
///
/// # Default Configuration
///
/// - `retries`: 3
/// - `request_timeout_ms`: 3000
/// - `total_deadline_ms`: 10000
/// - `rate_limit`: capacity 50, one token per 200ms
/// - `temporary_removal_ms`: 500 (0 disables temporary removal)
///
/// # Example
///
/// ```rust
/// use keypool_client::PoolConfig;
///
/// let config: PoolConfig = serde_json::from_str(r#"{"retries": 5}"#).unwrap();
/// assert_eq!(config.retries, 5);
/// assert_eq!(config.request_timeout_ms, 3000);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum attempts per dispatch
    pub retries: usize,
    /// Upper bound for a single transport call
    pub request_timeout_ms: u64,
    /// Upper bound for a whole dispatch, limiter wait included
    pub total_deadline_ms: u64,
    pub rate_limit: RateLimitConfig,
    /// How long a failed endpoint sits out of rotation
    pub temporary_removal_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            request_timeout_ms: 3000,
            total_deadline_ms: 10_000,
            rate_limit: RateLimitConfig::default(),
            temporary_removal_ms: 500,
        }
    }
}

impl PoolConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn total_deadline(&self) -> Duration {
        Duration::from_millis(self.total_deadline_ms)
    }

    /// `None` when temporary removal is turned off.
    pub fn temporary_removal(&self) -> Option<Duration> {
        (self.temporary_removal_ms > 0).then(|| Duration::from_millis(self.temporary_removal_ms))
    }

    /// Rejects values a pool cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.retries == 0 {
            return Err(PoolError::InvalidConfig("retries must be at least 1".to_string()));
        }
        if self.request_timeout_ms == 0 {
            return Err(PoolError::InvalidConfig("request_timeout_ms must be positive".to_string()));
        }
        if self.total_deadline_ms == 0 {
            return Err(PoolError::InvalidConfig("total_deadline_ms must be positive".to_string()));
        }
        self.rate_limit.validate().map_err(PoolError::InvalidConfig)
    }
}

/// Per-dispatch settings.
///
/// Encodings default to JSON. Timeouts left unset fall back to the pool's
/// [`PoolConfig`].
///
/// # Example
///
/// ```rust
/// use keypool_client::DispatchOptions;
/// use keypool_common::Encoding;
/// use std::time::Duration;
///
/// let options = DispatchOptions::new()
///     .with_encodings(Encoding::Utf8, Encoding::Utf8)
///     .with_total_deadline(Duration::from_millis(300));
/// assert_eq!(options.request_timeout, None);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    pub request_encoding: Encoding,
    pub response_encoding: Encoding,
    pub request_timeout: Option<Duration>,
    pub total_deadline: Option<Duration>,
}

impl DispatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_encodings(mut self, request: Encoding, response: Encoding) -> Self {
        self.request_encoding = request;
        self.response_encoding = response;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_total_deadline(mut self, deadline: Duration) -> Self {
        self.total_deadline = Some(deadline);
        self
    }
}
