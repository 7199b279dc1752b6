use std::time::Duration;

use keypool_common::rate_limit::RateLimiter;
use keypool_common::transport::{CallOptions, RpcTransport};
use keypool_common::{
    EndpointKey, PoolError, Result, RetryAction, RpcArgs, RpcResult, TransportError,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{DispatchOptions, PoolConfig};
use crate::registry::EndpointRegistry;
use crate::stats::{PoolStats, PoolStatsSnapshot};

/// Failover client pool over a set of interchangeable endpoints.
///
/// Every dispatch goes to the currently chosen endpoint. The pool keeps
/// using that endpoint while it answers and moves to the next one when it
/// times out, closes the channel or reports that it is overloaded.
///
/// # Architecture
///
/// - **Registry**: round-robin selection with temporary removal of failing
///   endpoints, see [`EndpointRegistry`]
/// - **Limiter**: optional token bucket consulted once per dispatch
/// - **Deadline**: a total time budget covering the limiter wait and every
///   attempt; when it fires the in-flight work is dropped
/// - **Transport**: any [`RpcTransport`]; the pool only sees results and
///   classified errors
///
/// # Retry Logic
///
/// Each failed attempt is classified by its [`TransportErrorKind`]:
///
/// - **Rotate** (timeout, channel closed, rate limited, too many requests):
///   move the selection off the failed endpoint, take it out of rotation
///   for `temporary_removal_ms`, retry on the endpoint rotation returned
/// - **Retry in place** (kinds that only retry in place): retry on whatever
///   is current
/// - **Fatal** (anything else): returned to the caller unchanged
///
/// After `retries` failed attempts the dispatch ends with
/// [`PoolError::TooManyRetries`].
///
/// # Thread Safety
///
/// All operations take `&self`. Share the pool behind an `Arc` to dispatch
/// from many tasks at once.
///
/// # Example
///
/// ```rust,no_run
/// use keypool_client::{ClientPool, DispatchOptions, PoolConfig};
/// use keypool_common::transport::{AddressBook, TcpTransport};
/// use keypool_common::Encoding;
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let entry = format!("{}@127.0.0.1:9001", "ab".repeat(32));
/// let (key, addr) = AddressBook::parse_entry(&entry)?;
/// let book: AddressBook = std::iter::once((key, addr)).collect();
///
/// let pool = ClientPool::new(vec![key], TcpTransport::new(book), PoolConfig::default())?;
/// let options = DispatchOptions::new().with_encodings(Encoding::Utf8, Encoding::Utf8);
/// let reply = pool.dispatch("echo", &json!("hi"), options).await?;
/// assert_eq!(reply, json!("hi"));
///
/// pool.shutdown();
/// # Ok(())
/// # }
/// ```
///
/// [`TransportErrorKind`]: keypool_common::TransportErrorKind
pub struct ClientPool<T: RpcTransport> {
    transport: T,
    registry: EndpointRegistry,
    limiter: Option<RateLimiter>,
    config: PoolConfig,
    stats: PoolStats,
    shutdown: CancellationToken,
}

impl<T: RpcTransport> ClientPool<T> {
    /// Creates a pool over `keys`, choosing the first endpoint at random.
    ///
    /// # Errors
    ///
    /// [`PoolError::InvalidConfig`] when `keys` is empty or `config` fails
    /// [`PoolConfig::validate`].
    pub fn new(keys: Vec<EndpointKey>, transport: T, config: PoolConfig) -> Result<Self> {
        config.validate()?;
        let registry = EndpointRegistry::new(keys)?;
        Ok(Self::assemble(registry, transport, config))
    }

    /// Like [`new`](Self::new), decoding hex or z-base-32 keys first.
    pub fn from_encoded<S: AsRef<str>>(keys: &[S], transport: T, config: PoolConfig) -> Result<Self> {
        let keys = keys
            .iter()
            .map(|encoded| EndpointKey::decode(encoded.as_ref()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Self::new(keys, transport, config)
    }

    fn assemble(registry: EndpointRegistry, transport: T, config: PoolConfig) -> Self {
        let limiter = RateLimiter::new(config.rate_limit);

        info!(
            endpoints = registry.len(),
            chosen = ?registry.current(),
            retries = config.retries,
            rate_limited = limiter.is_some(),
            "client pool created"
        );

        Self {
            transport,
            registry,
            limiter,
            config,
            stats: PoolStats::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Calls `method` on the chosen endpoint, failing over as needed.
    ///
    /// Per-attempt timeout and total deadline come from `options` when set,
    /// from the pool config otherwise.
    ///
    /// # Errors
    ///
    /// - [`PoolError::PoolRequestTimeout`] when the total deadline fires first
    /// - [`PoolError::TooManyRetries`] after `retries` retryable failures
    /// - [`PoolError::NoEndpointsAvailable`] when every endpoint is removed
    ///   and attempts remain
    /// - [`PoolError::Transport`] for a fatal transport error, unchanged
    /// - [`PoolError::Shutdown`] once [`shutdown`](Self::shutdown) was called
    /// - [`PoolError::InvalidConfig`] for a zero per-call override, before
    ///   any endpoint is tried
    pub async fn dispatch(&self, method: &str, args: &RpcArgs, options: DispatchOptions) -> Result<RpcResult> {
        if self.is_shutdown() {
            return Err(PoolError::Shutdown);
        }

        let request_timeout = options.request_timeout.unwrap_or_else(|| self.config.request_timeout());
        let deadline = options.total_deadline.unwrap_or_else(|| self.config.total_deadline());
        if request_timeout.is_zero() || deadline.is_zero() {
            return Err(PoolError::InvalidConfig(
                "per-call request timeout and total deadline must be positive".to_string(),
            ));
        }
        self.stats.record_dispatch();

        let call_options =
            CallOptions::new(request_timeout).with_encodings(options.request_encoding, options.response_encoding);

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(PoolError::Shutdown),
            outcome = tokio::time::timeout(deadline, self.run(method, args, &call_options)) => match outcome {
                Ok(result) => result,
                Err(_) => {
                    let deadline_ms = deadline.as_millis() as u64;
                    self.stats.record_deadline_expiry();
                    warn!(method, deadline_ms, "dispatch abandoned at total deadline");
                    Err(PoolError::PoolRequestTimeout { deadline_ms })
                }
            }
        }
    }

    async fn run(&self, method: &str, args: &RpcArgs, options: &CallOptions) -> Result<RpcResult> {
        if let Some(limiter) = &self.limiter {
            limiter
                .acquire(&self.shutdown)
                .await
                .map_err(|_| PoolError::Shutdown)?;
        }

        let retries = self.config.retries;
        let mut key = self.registry.current();
        let mut last_error: Option<TransportError> = None;

        for attempt in 1..=retries {
            self.stats.record_attempt();

            let err = match self.attempt(&key, method, args, options).await {
                Ok(result) => {
                    self.stats.record_success();
                    return Ok(result);
                }
                Err(err) => err,
            };

            match err.kind.retry_action() {
                RetryAction::Fatal => {
                    self.stats.record_fatal();
                    debug!(endpoint = ?key, method, attempt, "fatal transport error: {}", err);
                    return Err(PoolError::Transport(err));
                }
                RetryAction::RetryCurrent => {
                    warn!(endpoint = ?key, method, attempt, retries, "attempt failed, retrying in place: {}", err);
                    key = self.registry.current();
                }
                RetryAction::Rotate => {
                    warn!(endpoint = ?key, method, attempt, retries, "attempt failed, rotating: {}", err);
                    match self.registry.rotate_from(&key, &err) {
                        Ok(rotation) => {
                            if rotation.rotated {
                                self.stats.record_rotation();
                            }
                            if let Some(cooldown) = self.config.temporary_removal() {
                                self.registry.remove_temporarily(&key, cooldown);
                            }
                            key = rotation.key;
                        }
                        // Out of attempts anyway; report the retry budget instead
                        Err(_) if attempt == retries => {}
                        Err(no_endpoints) => {
                            self.stats.record_fatal();
                            return Err(no_endpoints);
                        }
                    }
                }
            }

            last_error = Some(err);
        }

        self.stats.record_exhausted();
        Err(PoolError::TooManyRetries {
            attempts: retries,
            last: last_error,
        })
    }

    async fn attempt(
        &self,
        key: &EndpointKey,
        method: &str,
        args: &RpcArgs,
        options: &CallOptions,
    ) -> std::result::Result<RpcResult, TransportError> {
        match tokio::time::timeout(options.timeout, self.transport.call(key, method, args, options)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::timeout(options.timeout.as_millis() as u64)),
        }
    }

    /// Stops the pool. Idempotent.
    ///
    /// Cancels pending reinsertions, fails queued limiter waiters and every
    /// in-flight or later dispatch with [`PoolError::Shutdown`].
    pub fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();
        if let Some(limiter) = &self.limiter {
            limiter.close();
        }
        self.registry.shutdown();
        info!(stats = ?self.stats.snapshot(), "client pool shut down");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn retries(&self) -> usize {
        self.config.retries
    }

    pub fn request_timeout(&self) -> Duration {
        self.config.request_timeout()
    }

    /// The endpoint the next dispatch starts on.
    pub fn chosen_key(&self) -> EndpointKey {
        self.registry.current()
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    /// `None` when the config disables rate limiting.
    pub fn rate_limiter(&self) -> Option<&RateLimiter> {
        self.limiter.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn stats(&self) -> PoolStatsSnapshot {
        self.stats.snapshot()
    }
}

#[cfg(test)]
impl<T: RpcTransport> ClientPool<T> {
    /// Pool whose selection starts at `initial`, for deterministic tests.
    pub(crate) fn with_initial_index(
        keys: Vec<EndpointKey>,
        initial: usize,
        transport: T,
        config: PoolConfig,
    ) -> Result<Self> {
        config.validate()?;
        let registry = EndpointRegistry::with_initial_index(keys, initial)?;
        Ok(Self::assemble(registry, transport, config))
    }
}

impl<T: RpcTransport> Drop for ClientPool<T> {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.registry.shutdown();
    }
}
