//! keypool Common Types and Transport
//!
//! This crate provides the shared building blocks of the keypool client:
//! endpoint keys, the transport error taxonomy, payload encodings, the
//! transport trait with a TCP reference implementation, and the token-bucket
//! rate limiter.
//!
//! # Overview
//!
//! A keypool client spreads RPC calls over a set of interchangeable endpoints
//! identified by 32-byte public keys. The client itself lives in
//! `keypool-client`; everything it depends on that is not pool logic lives
//! here:
//!
//! - **Keys**: [`EndpointKey`] decoded once from hex
//! - **Protocol Layer**: request/response frames and the closed set of
//!   [`TransportErrorKind`]s that decides retry behavior
//! - **Transport Layer**: the [`RpcTransport`](transport::RpcTransport)
//!   trait, [`JsonCodec`](transport::JsonCodec) framing and a TCP transport
//!   plus server
//! - **Rate Limiting**: a lazy, FIFO-fair token bucket
//!
//! # Wire Format
//!
//! - **Transport**: TCP, one connection per call
//! - **Serialization**: JSON frames, payload bytes encoded per [`Encoding`]
//! - **Message Format**: `[4-byte length prefix as u32 big-endian] + [JSON data]`
//! - **Max Message Size**: 16 MiB
//!
//! # Example
//!
//! ```
//! use keypool_common::{Encoding, Request, Response, TransportErrorKind};
//! use serde_json::json;
//!
//! let payload = Encoding::Utf8.encode(&json!("hi")).unwrap();
//! let request = Request::new("echo", payload).with_timeout(3000);
//!
//! let busy = Response::error(request.id, TransportErrorKind::TooManyRequests, "busy");
//! let err = busy.into_result().unwrap_err();
//! assert!(err.kind.rotates_endpoint());
//! ```

pub mod encoding;
pub mod key;
pub mod protocol;
pub mod rate_limit;
pub mod transport;

pub use encoding::Encoding;
pub use key::{EndpointKey, KeyError, KEY_LEN, Z32_KEY_LEN};
pub use protocol::*;
