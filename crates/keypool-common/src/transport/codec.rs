use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::error::TransportError;
use crate::protocol::{Request, Response};

/// Largest frame either side accepts (16 MiB).
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// JSON codec for request and response frames.
///
/// # Example
///
/// ```
/// use keypool_common::transport::JsonCodec;
/// use keypool_common::protocol::Request;
///
/// let request = Request::new("echo", b"hi".to_vec());
/// let encoded = JsonCodec::encode_request(&request).unwrap();
/// let decoded = JsonCodec::decode_request(&encoded).unwrap();
/// assert_eq!(request, decoded);
/// ```
pub struct JsonCodec;

impl JsonCodec {
    pub fn encode_request(request: &Request) -> Result<Vec<u8>, TransportError> {
        Ok(serde_json::to_vec(request)?)
    }

    pub fn decode_request(data: &[u8]) -> Result<Request, TransportError> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn encode_response(response: &Response) -> Result<Vec<u8>, TransportError> {
        Ok(serde_json::to_vec(response)?)
    }

    pub fn decode_response(data: &[u8]) -> Result<Response, TransportError> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Writes one length-prefixed frame and flushes.
    pub async fn write_frame<W>(stream: &mut W, data: &[u8]) -> Result<(), TransportError>
    where
        W: AsyncWrite + Unpin,
    {
        if data.len() > MAX_MESSAGE_SIZE {
            return Err(TransportError::protocol(format!(
                "frame too large: {} bytes (max {} bytes)",
                data.len(),
                MAX_MESSAGE_SIZE
            )));
        }
        let len = data.len() as u32;

        stream
            .write_all(&len.to_be_bytes())
            .await
            .map_err(|e| map_io_error(e, "writing length prefix"))?;
        stream
            .write_all(data)
            .await
            .map_err(|e| map_io_error(e, "writing frame"))?;
        stream
            .flush()
            .await
            .map_err(|e| map_io_error(e, "flushing stream"))?;

        Ok(())
    }

    /// Reads one length-prefixed frame.
    ///
    /// Returns `Ok(None)` when the peer closed the stream cleanly before a new frame began.
    pub async fn read_frame<R>(stream: &mut R) -> Result<Option<Vec<u8>>, TransportError>
    where
        R: AsyncRead + Unpin,
    {
        let mut len_buf = [0u8; 4];
        match stream.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(map_io_error(e, "reading length prefix")),
        }

        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_MESSAGE_SIZE {
            return Err(TransportError::protocol(format!(
                "frame too large: {} bytes (max {} bytes)",
                len, MAX_MESSAGE_SIZE
            )));
        }

        let mut buf = vec![0u8; len];
        stream
            .read_exact(&mut buf)
            .await
            .map_err(|e| map_io_error(e, "reading frame"))?;

        Ok(Some(buf))
    }
}

/// Maps I/O failures onto transport error kinds.
///
/// - timeouts -> `Timeout`
/// - refused, reset, aborted, broken pipe, EOF -> `ChannelClosed`
/// - anything else -> `Io`
pub(crate) fn map_io_error(err: std::io::Error, context: &str) -> TransportError {
    use crate::protocol::TransportErrorKind;
    use std::io::ErrorKind;

    let kind = match err.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => TransportErrorKind::Timeout,
        ErrorKind::ConnectionRefused
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::NotConnected
        | ErrorKind::BrokenPipe
        | ErrorKind::UnexpectedEof => TransportErrorKind::ChannelClosed,
        _ => TransportErrorKind::Io,
    };
    TransportError::new(kind, format!("{}: {}", context, err))
}
