//! End-to-end failover over real TCP endpoints
//!
//! Each test starts echo servers on ephemeral loopback ports and drives a
//! pool through [`TcpTransport`].

mod support;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use keypool_client::{ClientPool, DispatchOptions, PoolConfig};
use keypool_common::protocol::{Request, Response};
use keypool_common::rate_limit::RateLimitConfig;
use keypool_common::transport::{AddressBook, TcpRpcServer, TcpTransport};
use keypool_common::{Encoding, EndpointKey, PoolError, TransportErrorKind};
use serde_json::json;
use support::{key, keys, next_after};
use tokio_util::sync::CancellationToken;

/// Echo endpoint that can be told to stall before answering.
struct EchoServer {
    addr: String,
    stop: CancellationToken,
    slow: Arc<AtomicBool>,
}

impl EchoServer {
    async fn start() -> Self {
        let server = TcpRpcServer::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap().to_string();
        let stop = CancellationToken::new();
        let slow = Arc::new(AtomicBool::new(false));

        let stalled = slow.clone();
        tokio::spawn(server.run_with_handler(
            move |req: Request| {
                let stalled = stalled.load(Ordering::SeqCst);
                async move {
                    if stalled {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                    Response::success(req.id, req.payload)
                }
            },
            stop.clone(),
        ));

        Self { addr, stop, slow }
    }

    async fn kill(&self) {
        self.stop.cancel();
        // Let the accept loop observe the cancellation and drop the listener
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

struct Cluster {
    servers: Vec<(EndpointKey, EchoServer)>,
}

impl Cluster {
    async fn start(count: u8) -> Self {
        let mut servers = Vec::new();
        for k in keys(count) {
            servers.push((k, EchoServer::start().await));
        }
        Self { servers }
    }

    fn keys(&self) -> Vec<EndpointKey> {
        self.servers.iter().map(|(k, _)| *k).collect()
    }

    fn server(&self, key: &EndpointKey) -> &EchoServer {
        &self.servers.iter().find(|(k, _)| k == key).unwrap().1
    }

    fn transport(&self) -> TcpTransport {
        TcpTransport::new(self.servers.iter().map(|(k, s)| (*k, s.addr.clone())).collect())
    }

    fn pool(&self, config: PoolConfig) -> ClientPool<TcpTransport> {
        ClientPool::new(self.keys(), self.transport(), config).unwrap()
    }
}

impl Drop for Cluster {
    fn drop(&mut self) {
        for (_, server) in &self.servers {
            server.stop.cancel();
        }
    }
}

fn utf8() -> DispatchOptions {
    DispatchOptions::new().with_encodings(Encoding::Utf8, Encoding::Utf8)
}

fn config() -> PoolConfig {
    PoolConfig {
        request_timeout_ms: 300,
        rate_limit: RateLimitConfig::disabled(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_echo_through_pool() {
    let cluster = Cluster::start(3).await;
    let pool = cluster.pool(config());

    let reply = pool.dispatch("echo", &json!("hi"), utf8()).await.unwrap();
    assert_eq!(reply, json!("hi"));
    pool.shutdown();
}

#[tokio::test]
async fn test_json_payload_through_pool() {
    let cluster = Cluster::start(2).await;
    let pool = cluster.pool(config());

    let args = json!({"nested": {"list": [1, 2, 3]}, "flag": true});
    let reply = pool.dispatch("echo", &args, DispatchOptions::new()).await.unwrap();
    assert_eq!(reply, args);
    pool.shutdown();
}

#[tokio::test]
async fn test_failover_when_chosen_endpoint_dies() {
    let cluster = Cluster::start(3).await;
    let pool = cluster.pool(config());
    let chosen = pool.chosen_key();

    assert_eq!(pool.dispatch("echo", &json!("before"), utf8()).await.unwrap(), json!("before"));

    cluster.server(&chosen).kill().await;

    assert_eq!(pool.dispatch("echo", &json!("after"), utf8()).await.unwrap(), json!("after"));
    assert_eq!(pool.chosen_key(), next_after(&cluster.keys(), &chosen));
    pool.shutdown();
}

#[tokio::test]
async fn test_failover_when_chosen_endpoint_stalls() {
    let cluster = Cluster::start(3).await;
    let pool = cluster.pool(config());
    let chosen = pool.chosen_key();
    cluster.server(&chosen).slow.store(true, Ordering::SeqCst);

    let start = std::time::Instant::now();
    let reply = pool.dispatch("echo", &json!("hi"), utf8()).await.unwrap();

    assert_eq!(reply, json!("hi"));
    assert!(start.elapsed() >= Duration::from_millis(300));
    assert!(start.elapsed() < Duration::from_secs(3));
    assert_ne!(pool.chosen_key(), chosen);
    pool.shutdown();
}

#[tokio::test]
async fn test_unknown_keys_exhaust_retries() {
    let cluster = Cluster::start(1).await;
    let strangers = vec![key(0xa0), key(0xa1), key(0xa2)];
    let pool = ClientPool::new(strangers, cluster.transport(), config()).unwrap();

    let err = pool.dispatch("echo", &json!("hi"), utf8()).await.unwrap_err();

    assert_eq!(err.code(), "TOO_MANY_RETRIES");
    assert_eq!(err.transport_kind(), Some(TransportErrorKind::ChannelClosed));
    pool.shutdown();
}

#[tokio::test]
async fn test_all_endpoints_stalled_hits_deadline() {
    let cluster = Cluster::start(2).await;
    for k in cluster.keys() {
        cluster.server(&k).slow.store(true, Ordering::SeqCst);
    }
    let pool = cluster.pool(PoolConfig {
        request_timeout_ms: 200,
        total_deadline_ms: 300,
        retries: 5,
        ..config()
    });

    let err = pool.dispatch("echo", &json!("hi"), utf8()).await.unwrap_err();
    assert!(matches!(err, PoolError::PoolRequestTimeout { deadline_ms: 300 }), "{:?}", err);
    pool.shutdown();
}

#[tokio::test]
async fn test_from_encoded_keys() {
    let cluster = Cluster::start(2).await;
    let encoded: Vec<String> = cluster.keys().iter().map(|k| k.to_hex()).collect();
    let book: AddressBook = cluster
        .servers
        .iter()
        .map(|(k, s)| (*k, s.addr.clone()))
        .collect();

    let pool = ClientPool::from_encoded(&encoded, TcpTransport::new(book), config()).unwrap();
    assert_eq!(pool.registry().members(), cluster.keys());
    assert_eq!(pool.dispatch("echo", &json!("hi"), utf8()).await.unwrap(), json!("hi"));
    pool.shutdown();
}
