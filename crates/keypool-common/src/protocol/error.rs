//! Error Taxonomy
//!
//! Transport failures carry a [`TransportErrorKind`] from a closed set. The
//! kind alone decides how a pool reacts to the failure:
//!
//! | kind | rotate endpoint | retry in place | outcome |
//! |---|---|---|---|
//! | `Timeout` | yes | no | retry on the next endpoint |
//! | `ChannelClosed` | yes | no | retry on the next endpoint |
//! | `RateLimited` | yes | yes | retry on the next endpoint |
//! | `TooManyRequests` | yes | yes | retry on the next endpoint |
//! | anything else | no | no | returned to the caller unchanged |
//!
//! The two retry axes are independent. When both apply, rotation wins; a
//! kind that only retries in place retries on whatever endpoint is current.
//!
//! [`PoolError`] holds the pool's own terminal errors plus the pass-through
//! case.

use crate::key::KeyError;
use thiserror::Error;

/// Closed set of transport failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The call did not complete within its per-attempt timeout
    Timeout,
    /// The connection or channel to the endpoint closed or could not be opened
    ChannelClosed,
    /// The endpoint asked us to slow down
    RateLimited,
    /// The endpoint is overloaded and refused the request
    TooManyRequests,
    /// The remote handler failed
    Remote,
    /// Arguments or results could not be encoded/decoded
    Encoding,
    /// Malformed frame or unexpected reply
    Protocol,
    /// Local I/O failure not covered above
    Io,
}

/// What a pool should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    /// Rotate away from the endpoint that failed, then retry
    Rotate,
    /// Retry against the currently chosen endpoint
    RetryCurrent,
    /// Give up and hand the error to the caller
    Fatal,
}

impl TransportErrorKind {
    /// Stable string code, also used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Timeout => "REQUEST_TIMEOUT",
            Self::ChannelClosed => "CHANNEL_CLOSED",
            Self::RateLimited => "RATE_LIMITED",
            Self::TooManyRequests => "TOO_MANY_REQUESTS",
            Self::Remote => "REMOTE_ERROR",
            Self::Encoding => "ENCODING_ERROR",
            Self::Protocol => "PROTOCOL_ERROR",
            Self::Io => "IO_ERROR",
        }
    }

    /// Inverse of [`code`](Self::code). Unknown codes map to `Remote`.
    pub fn from_code(code: &str) -> Self {
        match code {
            "REQUEST_TIMEOUT" => Self::Timeout,
            "CHANNEL_CLOSED" => Self::ChannelClosed,
            "RATE_LIMITED" => Self::RateLimited,
            "TOO_MANY_REQUESTS" => Self::TooManyRequests,
            "ENCODING_ERROR" => Self::Encoding,
            "PROTOCOL_ERROR" => Self::Protocol,
            "IO_ERROR" => Self::Io,
            _ => Self::Remote,
        }
    }

    /// Whether the failure should move the pool off the endpoint that produced it.
    pub fn rotates_endpoint(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::ChannelClosed | Self::RateLimited | Self::TooManyRequests
        )
    }

    /// Whether the failure may be retried without forcing a new endpoint.
    pub fn retries_in_place(&self) -> bool {
        matches!(self, Self::RateLimited | Self::TooManyRequests)
    }

    pub fn is_retryable(&self) -> bool {
        self.rotates_endpoint() || self.retries_in_place()
    }

    /// Folds both classification axes into one action. Rotation wins when
    /// both apply.
    pub fn retry_action(&self) -> RetryAction {
        if self.rotates_endpoint() {
            RetryAction::Rotate
        } else if self.retries_in_place() {
            RetryAction::RetryCurrent
        } else {
            RetryAction::Fatal
        }
    }
}

/// Failure reported by a transport call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}: {message}", .kind.code())]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(timeout_ms: u64) -> Self {
        Self::new(
            TransportErrorKind::Timeout,
            format!("request timed out after {}ms", timeout_ms),
        )
    }

    pub fn channel_closed(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::ChannelClosed, message)
    }

    pub fn encoding(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Encoding, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Protocol, message)
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::protocol(format!("invalid frame: {}", err))
    }
}

/// Errors surfaced by a client pool.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("POOL_REQUEST_TIMEOUT: no result within {deadline_ms}ms")]
    PoolRequestTimeout { deadline_ms: u64 },

    #[error("TOO_MANY_RETRIES: gave up after {attempts} attempts{}", last_suffix(.last))]
    TooManyRetries {
        attempts: usize,
        last: Option<TransportError>,
    },

    #[error("NO_ENDPOINTS_AVAILABLE: every endpoint is temporarily removed ({cause})")]
    NoEndpointsAvailable { cause: TransportError },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("POOL_SHUTDOWN: the pool has been shut down")]
    Shutdown,

    #[error("INVALID_KEY: {0}")]
    InvalidKey(#[from] KeyError),

    #[error("INVALID_CONFIG: {0}")]
    InvalidConfig(String),
}

fn last_suffix(last: &Option<TransportError>) -> String {
    match last {
        Some(err) => format!(" (last error: {})", err),
        None => String::new(),
    }
}

impl PoolError {
    /// Stable string code. Pass-through errors keep the transport's code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PoolRequestTimeout { .. } => "POOL_REQUEST_TIMEOUT",
            Self::TooManyRetries { .. } => "TOO_MANY_RETRIES",
            Self::NoEndpointsAvailable { .. } => "NO_ENDPOINTS_AVAILABLE",
            Self::Transport(err) => err.code(),
            Self::Shutdown => "POOL_SHUTDOWN",
            Self::InvalidKey(_) => "INVALID_KEY",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }

    /// Kind of the transport failure behind this error, if any.
    pub fn transport_kind(&self) -> Option<TransportErrorKind> {
        match self {
            Self::Transport(err) => Some(err.kind),
            Self::NoEndpointsAvailable { cause } => Some(cause.kind),
            Self::TooManyRetries { last, .. } => last.as_ref().map(|e| e.kind),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PoolError>;
