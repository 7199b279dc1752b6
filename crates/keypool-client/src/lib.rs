//! keypool Client Pool
//!
//! A client-side dispatcher that spreads RPC calls over a set of
//! interchangeable endpoints addressed by public key.
//!
//! # Components
//!
//! - [`ClientPool`] - dispatch with failover, total deadline and rate limiting
//! - [`EndpointRegistry`] - round-robin selection with temporary removal
//! - [`PoolConfig`] / [`DispatchOptions`] - pool-wide and per-call settings
//! - [`PoolStats`] - counters describing what the pool has done
//!
//! The transport is pluggable through
//! [`RpcTransport`](keypool_common::transport::RpcTransport); a TCP
//! implementation ships in `keypool-common`.

pub mod config;
pub mod pool;
pub mod registry;
pub mod stats;

pub use config::{DispatchOptions, PoolConfig};
pub use pool::ClientPool;
pub use registry::{EndpointRegistry, Rotation};
pub use stats::{PoolStats, PoolStatsSnapshot};
