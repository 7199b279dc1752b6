//! Echo endpoint behind `keypool serve`.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use keypool_common::protocol::{Request, Response, TransportErrorKind};
use keypool_common::transport::TcpRpcServer;
use keypool_common::EndpointKey;
use rand::Rng;
use tokio_util::sync::CancellationToken;

/// Creates a random endpoint key.
pub fn generate_key() -> EndpointKey {
    let mut raw = [0u8; 32];
    rand::thread_rng().fill(&mut raw);
    EndpointKey::from(raw)
}

/// Answers `echo` with the request payload and `ping` with `pong`,
/// optionally after `delay`.
pub async fn handle(request: Request, delay: Duration) -> Response {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    match request.method.as_str() {
        "echo" => Response::success(request.id, request.payload),
        "ping" => Response::success(request.id, b"\"pong\"".to_vec()),
        other => Response::error(
            request.id,
            TransportErrorKind::Remote,
            format!("unknown method '{}'", other),
        ),
    }
}

/// A bound echo endpoint, not yet serving.
pub struct EchoEndpoint {
    key: EndpointKey,
    server: TcpRpcServer,
    delay: Duration,
}

impl EchoEndpoint {
    pub async fn bind(bind: &str, key: EndpointKey, delay: Duration) -> Result<Self> {
        let server = TcpRpcServer::bind(bind)
            .await
            .with_context(|| format!("failed to bind {}", bind))?;
        Ok(Self { key, server, delay })
    }

    pub fn key(&self) -> EndpointKey {
        self.key
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.server.local_addr()?)
    }

    /// Entry for `keypool call -e`.
    pub fn entry(&self) -> Result<String> {
        Ok(format!("{}@{}", self.key, self.local_addr()?))
    }

    /// Serves until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let delay = self.delay;
        tracing::info!(key = %self.key, delay_ms = delay.as_millis() as u64, "echo endpoint serving");
        self.server
            .run_with_handler(move |request| handle(request, delay), shutdown)
            .await?;
        tracing::info!("echo endpoint stopped");
        Ok(())
    }
}
