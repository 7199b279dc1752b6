use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::protocol::error::TransportError;
use crate::protocol::{Request, Response, TransportErrorKind};
use crate::transport::codec::{map_io_error, JsonCodec};

/// Async TCP server speaking the keypool frame protocol.
///
/// Every accepted connection is served on its own task and may carry any
/// number of request frames. The handler's [`Response`] is written back
/// as-is, so a handler signals rate limiting by returning an error frame
/// with the matching kind.
pub struct TcpRpcServer {
    listener: TcpListener,
}

impl TcpRpcServer {
    /// Binds to `bind_addr` (e.g. "127.0.0.1:0").
    pub async fn bind(bind_addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| map_io_error(e, &format!("binding {}", bind_addr)))?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener
            .local_addr()
            .map_err(|e| map_io_error(e, "reading local address"))
    }

    /// Serves connections until `shutdown` is cancelled.
    ///
    /// Connection tasks spawned before shutdown finish their current frame
    /// and stop at the next read.
    pub async fn run_with_handler<F, Fut>(self, handler: F, shutdown: CancellationToken) -> Result<(), TransportError>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let handler = Arc::new(handler);

        loop {
            let (stream, peer) = tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("server shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    accepted.map_err(|e| map_io_error(e, "accepting connection"))?
                }
            };

            debug!(%peer, "connection established");

            let handler = handler.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, handler, shutdown).await {
                    warn!(%peer, "connection error: {}", e);
                }
            });
        }
    }
}

async fn handle_connection<F, Fut>(
    mut stream: TcpStream,
    handler: Arc<F>,
    shutdown: CancellationToken,
) -> Result<(), TransportError>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            frame = JsonCodec::read_frame(&mut stream) => frame?,
        };
        let Some(frame) = frame else {
            return Ok(());
        };

        let response = match JsonCodec::decode_request(&frame) {
            Ok(request) => handler(request).await,
            Err(e) => Response::error(0, TransportErrorKind::Protocol, e.to_string()),
        };

        let encoded = JsonCodec::encode_response(&response)?;
        JsonCodec::write_frame(&mut stream, &encoded).await?;
    }
}
