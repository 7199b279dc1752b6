//! One-shot dispatch behind `keypool call`.

use std::path::Path;

use anyhow::{bail, Context, Result};
use keypool_client::{ClientPool, DispatchOptions, PoolConfig};
use keypool_common::transport::{AddressBook, TcpTransport};
use keypool_common::{Encoding, EndpointKey};
use serde_json::Value;

/// Flag values that override the loaded config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Overrides {
    pub retries: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub deadline_ms: Option<u64>,
}

/// Reads a JSON [`PoolConfig`], or returns the defaults without a path.
pub fn load_config(path: Option<&Path>) -> Result<PoolConfig> {
    let Some(path) = path else {
        return Ok(PoolConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: PoolConfig = serde_json::from_str(&raw)
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(config)
}

pub fn apply_overrides(mut config: PoolConfig, overrides: Overrides) -> PoolConfig {
    if let Some(retries) = overrides.retries {
        config.retries = retries;
    }
    if let Some(timeout_ms) = overrides.timeout_ms {
        config.request_timeout_ms = timeout_ms;
    }
    if let Some(deadline_ms) = overrides.deadline_ms {
        config.total_deadline_ms = deadline_ms;
    }
    config
}

/// Turns the command-line argument into a value for `encoding`.
///
/// JSON arguments are parsed; UTF-8 and binary (hex) arguments are taken
/// as strings.
pub fn parse_args(raw: &str, encoding: Encoding) -> Result<Value> {
    match encoding {
        Encoding::Json => serde_json::from_str(raw).with_context(|| format!("arguments are not valid JSON: {}", raw)),
        Encoding::Utf8 | Encoding::Binary => Ok(Value::String(raw.to_string())),
    }
}

/// Builds a TCP-backed pool from `<key>@<addr>` entries, keeping their order.
pub fn build_pool(entries: &[String], config: PoolConfig) -> Result<ClientPool<TcpTransport>> {
    if entries.is_empty() {
        bail!("at least one endpoint is required (-e <key>@<addr>)");
    }

    let mut keys: Vec<EndpointKey> = Vec::with_capacity(entries.len());
    let mut book = AddressBook::new();
    for entry in entries {
        let (key, addr) =
            AddressBook::parse_entry(entry).with_context(|| format!("invalid endpoint '{}'", entry))?;
        keys.push(key);
        book.insert(key, addr);
    }

    Ok(ClientPool::new(keys, TcpTransport::new(book), config)?)
}

/// Dispatches `method` once and shuts the pool down.
pub async fn run(entries: &[String], config: PoolConfig, method: &str, args: &str, encoding: Encoding) -> Result<Value> {
    let args = parse_args(args, encoding)?;
    let pool = build_pool(entries, config)?;

    let options = DispatchOptions::new().with_encodings(encoding, encoding);
    let result = pool.dispatch(method, &args, options).await;
    pool.shutdown();

    Ok(result?)
}
