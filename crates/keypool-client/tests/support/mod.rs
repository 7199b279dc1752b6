//! Shared fixtures for keypool-client integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use keypool_common::transport::{CallOptions, RpcTransport};
use keypool_common::{EndpointKey, RpcArgs, RpcResult, TransportError, TransportErrorKind};
use serde_json::json;

pub fn key(byte: u8) -> EndpointKey {
    EndpointKey::from([byte; 32])
}

pub fn keys(count: u8) -> Vec<EndpointKey> {
    (0..count).map(key).collect()
}

/// Member that follows `key` in round-robin order.
pub fn next_after(members: &[EndpointKey], key: &EndpointKey) -> EndpointKey {
    let idx = members.iter().position(|k| k == key).expect("key is a member");
    members[(idx + 1) % members.len()]
}

/// What a scripted endpoint does when called.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Answer immediately with the endpoint's hex key
    Reply,
    /// Fail immediately with this kind
    Fail(TransportErrorKind),
    /// Answer after sleeping
    Delay(Duration),
}

/// Transport whose endpoints follow a per-key script.
///
/// Queued behaviors are consumed first, one per call; the standing
/// behavior applies afterwards. Unscripted endpoints reply.
#[derive(Default)]
pub struct MockTransport {
    standing: Mutex<HashMap<EndpointKey, Behavior>>,
    queued: Mutex<HashMap<EndpointKey, VecDeque<Behavior>>>,
    calls: Mutex<Vec<EndpointKey>>,
    options: Mutex<Vec<CallOptions>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn always(self, key: EndpointKey, behavior: Behavior) -> Self {
        self.standing.lock().unwrap().insert(key, behavior);
        self
    }

    pub fn then(self, key: EndpointKey, behavior: Behavior) -> Self {
        self.queued.lock().unwrap().entry(key).or_default().push_back(behavior);
        self
    }

    pub fn set(&self, key: EndpointKey, behavior: Behavior) {
        self.standing.lock().unwrap().insert(key, behavior);
    }

    pub fn calls(&self) -> Vec<EndpointKey> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_options(&self) -> Option<CallOptions> {
        self.options.lock().unwrap().last().copied()
    }

    fn next_behavior(&self, key: &EndpointKey) -> Behavior {
        if let Some(behavior) = self.queued.lock().unwrap().get_mut(key).and_then(VecDeque::pop_front) {
            return behavior;
        }
        self.standing
            .lock()
            .unwrap()
            .get(key)
            .copied()
            .unwrap_or(Behavior::Reply)
    }
}

impl RpcTransport for MockTransport {
    async fn call(
        &self,
        key: &EndpointKey,
        _method: &str,
        _args: &RpcArgs,
        options: &CallOptions,
    ) -> Result<RpcResult, TransportError> {
        self.calls.lock().unwrap().push(*key);
        self.options.lock().unwrap().push(*options);

        match self.next_behavior(key) {
            Behavior::Reply => Ok(json!(key.to_hex())),
            Behavior::Fail(kind) => Err(TransportError::new(kind, "scripted failure")),
            Behavior::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(json!(key.to_hex()))
            }
        }
    }
}
