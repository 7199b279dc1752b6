//! Transport Layer
//!
//! A pool talks to endpoints through the [`RpcTransport`] trait. The trait is
//! the whole contract: given an endpoint key, a method, arguments and
//! [`CallOptions`], produce a decoded result or a typed [`TransportError`].
//!
//! # Components
//!
//! - **[`RpcTransport`]** / **[`CallOptions`]**: the collaborator interface
//! - **[`JsonCodec`]**: frame encoding plus length-prefixed read/write helpers
//! - **[`TcpTransport`]** / **[`AddressBook`]**: reference transport over TCP
//! - **[`TcpRpcServer`]**: serves frames to a handler, used by `keypool serve`
//!
//! # Wire Format
//!
//! `[4-byte length prefix as u32 big-endian] + [JSON frame]`, capped at
//! [`MAX_MESSAGE_SIZE`].

pub mod codec;
pub mod tcp;
pub mod tcp_server;

pub use codec::{JsonCodec, MAX_MESSAGE_SIZE};
pub use tcp::{AddressBook, TcpTransport};
pub use tcp_server::TcpRpcServer;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::encoding::Encoding;
use crate::key::EndpointKey;
use crate::protocol::error::TransportError;
use crate::protocol::{RpcArgs, RpcResult};

/// Per-call settings handed to a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallOptions {
    /// Upper bound for this single call
    pub timeout: Duration,
    pub request_encoding: Encoding,
    pub response_encoding: Encoding,
}

impl CallOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            request_encoding: Encoding::default(),
            response_encoding: Encoding::default(),
        }
    }

    pub fn with_encodings(mut self, request: Encoding, response: Encoding) -> Self {
        self.request_encoding = request;
        self.response_encoding = response;
        self
    }
}

/// An asynchronous RPC client able to reach an endpoint by key.
///
/// Implementations must report failures with the [`TransportErrorKind`]
/// that describes them; a pool retries or gives up based on that kind
/// alone. Returned futures may be dropped at any await point when a
/// deadline fires.
///
/// [`TransportErrorKind`]: crate::protocol::TransportErrorKind
pub trait RpcTransport: Send + Sync + 'static {
    fn call(
        &self,
        key: &EndpointKey,
        method: &str,
        args: &RpcArgs,
        options: &CallOptions,
    ) -> impl Future<Output = Result<RpcResult, TransportError>> + Send;
}

impl<T: RpcTransport> RpcTransport for Arc<T> {
    fn call(
        &self,
        key: &EndpointKey,
        method: &str,
        args: &RpcArgs,
        options: &CallOptions,
    ) -> impl Future<Output = Result<RpcResult, TransportError>> + Send {
        (**self).call(key, method, args, options)
    }
}
