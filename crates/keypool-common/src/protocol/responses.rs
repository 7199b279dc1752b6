//! Response Frames
//!
//! A reply carries either an encoded payload or a [`WireError`]. Error codes
//! use the same strings as [`TransportErrorKind::code`], so an endpoint can
//! tell the caller it is rate limited and the pool will react to it.

use serde::{Deserialize, Serialize};

use super::error::{TransportError, TransportErrorKind};
use super::RequestId;

/// RPC method result after decoding with the response encoding.
pub type RpcResult = serde_json::Value;

/// Error reported by the remote side of a call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireError {
    pub code: String,
    pub message: String,
}

impl WireError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            code: kind.code().to_string(),
            message: message.into(),
        }
    }
}

impl From<WireError> for TransportError {
    fn from(err: WireError) -> Self {
        TransportError::new(TransportErrorKind::from_code(&err.code), err.message)
    }
}

/// A response frame returned by an endpoint.
///
/// # Example
///
/// ```
/// use keypool_common::protocol::{Response, TransportErrorKind};
///
/// let ok = Response::success(7, b"hi".to_vec());
/// assert!(ok.is_success());
///
/// let busy = Response::error(7, TransportErrorKind::TooManyRequests, "busy");
/// assert_eq!(busy.error.unwrap().code, "TOO_MANY_REQUESTS");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
    /// Request identifier this response corresponds to
    pub id: RequestId,
    /// Encoded result (present on success)
    pub payload: Option<Vec<u8>>,
    /// Remote failure (present on error)
    pub error: Option<WireError>,
}

impl Response {
    pub fn success(id: RequestId, payload: Vec<u8>) -> Self {
        Response {
            id,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn error(id: RequestId, kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Response {
            id,
            payload: None,
            error: Some(WireError::new(kind, message)),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Splits the frame into the payload or the transport error it carries.
    pub fn into_result(self) -> Result<Vec<u8>, TransportError> {
        match (self.payload, self.error) {
            (_, Some(err)) => Err(err.into()),
            (Some(payload), None) => Ok(payload),
            (None, None) => Err(TransportError::protocol("response carries neither payload nor error")),
        }
    }
}
