use std::collections::HashMap;
use std::fmt;

use tokio::net::TcpStream;

use crate::key::{EndpointKey, KeyError};
use crate::protocol::error::TransportError;
use crate::protocol::{Request, Response, RpcArgs, RpcResult};
use crate::transport::codec::{map_io_error, JsonCodec};
use crate::transport::{CallOptions, RpcTransport};

/// Static mapping from endpoint keys to socket addresses.
///
/// Stands in for key-based discovery: the book is filled once and never
/// consulted for anything but routing.
///
/// # Example
///
/// ```
/// use keypool_common::transport::AddressBook;
///
/// let entry = format!("{}@127.0.0.1:9001", "ab".repeat(32));
/// let (key, addr) = AddressBook::parse_entry(&entry).unwrap();
///
/// let mut book = AddressBook::new();
/// book.insert(key, addr);
/// assert_eq!(book.resolve(&key), Some("127.0.0.1:9001"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct AddressBook {
    routes: HashMap<EndpointKey, String>,
}

impl AddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the address for `key`.
    pub fn insert(&mut self, key: EndpointKey, addr: impl Into<String>) {
        self.routes.insert(key, addr.into());
    }

    pub fn resolve(&self, key: &EndpointKey) -> Option<&str> {
        self.routes.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Parses a `<key>@<host:port>` entry; the key is hex or z-base-32.
    pub fn parse_entry(entry: &str) -> Result<(EndpointKey, String), KeyError> {
        let (key, addr) = entry
            .split_once('@')
            .ok_or_else(|| KeyError::InvalidHex(format!("expected <key>@<addr>, got '{}'", entry)))?;
        Ok((EndpointKey::decode(key)?, addr.trim().to_string()))
    }
}

impl FromIterator<(EndpointKey, String)> for AddressBook {
    fn from_iter<I: IntoIterator<Item = (EndpointKey, String)>>(iter: I) -> Self {
        Self {
            routes: iter.into_iter().collect(),
        }
    }
}

/// Reference [`RpcTransport`] over TCP.
///
/// Each call opens a fresh connection, so concurrent calls to the same
/// endpoint never queue behind one another. Connection management stays
/// out of the pool.
///
/// # Error Mapping
///
/// - per-call timeout elapsed -> `Timeout`
/// - unknown key, refused/reset connection, EOF before reply -> `ChannelClosed`
/// - error frame from the endpoint -> the kind named by its code
/// - bad arguments or undecodable result -> `Encoding`
pub struct TcpTransport {
    book: AddressBook,
}

impl TcpTransport {
    pub fn new(book: AddressBook) -> Self {
        Self { book }
    }

    pub fn address_book(&self) -> &AddressBook {
        &self.book
    }

    async fn round_trip(addr: &str, request: &Request) -> Result<Response, TransportError> {
        let mut stream = TcpStream::connect(addr)
            .await
            .map_err(|e| map_io_error(e, &format!("connecting to {}", addr)))?;

        let encoded = JsonCodec::encode_request(request)?;
        JsonCodec::write_frame(&mut stream, &encoded).await?;

        let reply = JsonCodec::read_frame(&mut stream)
            .await?
            .ok_or_else(|| TransportError::channel_closed(format!("{} closed the connection before replying", addr)))?;

        JsonCodec::decode_response(&reply)
    }
}

impl fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpTransport")
            .field("routes", &self.book.len())
            .finish()
    }
}

impl RpcTransport for TcpTransport {
    async fn call(
        &self,
        key: &EndpointKey,
        method: &str,
        args: &RpcArgs,
        options: &CallOptions,
    ) -> Result<RpcResult, TransportError> {
        let addr = self
            .book
            .resolve(key)
            .ok_or_else(|| TransportError::channel_closed(format!("no route to endpoint {}", key)))?;

        let payload = options.request_encoding.encode(args)?;
        let timeout_ms = options.timeout.as_millis() as u64;
        let request = Request::new(method, payload).with_timeout(timeout_ms);

        tracing::trace!(endpoint = ?key, %addr, method, id = request.id, "sending request");

        let response = tokio::time::timeout(options.timeout, Self::round_trip(addr, &request))
            .await
            .map_err(|_| TransportError::timeout(timeout_ms))??;

        if response.id != request.id {
            return Err(TransportError::protocol(format!(
                "response id {} does not match request id {}",
                response.id, request.id
            )));
        }

        let payload = response.into_result()?;
        options.response_encoding.decode(&payload)
    }
}
