//! Shared fixtures: an in-memory backend with scripted, gateable responses.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use kalon_explorer::client::Backend;
use kalon_explorer::error::FetchError;
use kalon_explorer::models::{AddressInfo, Block, NetworkStats, Transaction};
use kalon_explorer::resource::{Listing, ResourceKey, ResourceKind, ResourceValue};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

pub type Reply = Result<ResourceValue, FetchError>;

enum Step {
    Ready(Reply),
    Gated(oneshot::Receiver<Reply>),
}

#[derive(Default)]
struct MockState {
    scripts: HashMap<ResourceKind, VecDeque<Step>>,
    requested: Vec<ResourceKey>,
    blocks: HashMap<String, Block>,
    heights: HashMap<u64, Block>,
    transactions: HashMap<String, Transaction>,
    addresses: HashMap<String, AddressInfo>,
    block_delay: Duration,
    tx_delay: Duration,
    lookup_error: Option<FetchError>,
    lookups: usize,
}

/// Backend double. Resource fetches pop scripted steps per kind and fall
/// back to a default payload; entity lookups answer from in-memory maps.
#[derive(Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, kind: ResourceKind, reply: Reply) {
        self.state
            .lock()
            .scripts
            .entry(kind)
            .or_default()
            .push_back(Step::Ready(reply));
    }

    /// Next fetch of `kind` blocks until the returned sender fires.
    pub fn gate(&self, kind: ResourceKind) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.state
            .lock()
            .scripts
            .entry(kind)
            .or_default()
            .push_back(Step::Gated(rx));
        tx
    }

    pub fn add_block(&self, block: Block) {
        let mut state = self.state.lock();
        state.heights.insert(block.number, block.clone());
        state.blocks.insert(block.hash.to_lowercase(), block);
    }

    pub fn add_transaction(&self, tx: Transaction) {
        self.state.lock().transactions.insert(tx.hash.to_lowercase(), tx);
    }

    pub fn add_address(&self, info: AddressInfo) {
        self.state.lock().addresses.insert(info.address.to_lowercase(), info);
    }

    pub fn set_lookup_delays(&self, block: Duration, tx: Duration) {
        let mut state = self.state.lock();
        state.block_delay = block;
        state.tx_delay = tx;
    }

    pub fn fail_lookups(&self, error: FetchError) {
        self.state.lock().lookup_error = Some(error);
    }

    /// Total resource fetches started.
    pub fn calls(&self) -> usize {
        self.state.lock().requested.len()
    }

    pub fn calls_for(&self, kind: ResourceKind) -> usize {
        self.state
            .lock()
            .requested
            .iter()
            .filter(|key| key.kind == kind)
            .count()
    }

    pub fn requested(&self) -> Vec<ResourceKey> {
        self.state.lock().requested.clone()
    }

    /// Entity lookups (block/tx/address) started.
    pub fn lookups(&self) -> usize {
        self.state.lock().lookups
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    async fn lookup<T: Clone>(
        &self,
        delay: impl Fn(&MockState) -> Duration,
        find: impl Fn(&MockState) -> Option<T>,
    ) -> Result<T, FetchError> {
        let (delay, error) = {
            let mut state = self.state.lock();
            state.lookups += 1;
            (delay(&state), state.lookup_error.clone())
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = error {
            return Err(error);
        }
        find(&self.state.lock()).ok_or(FetchError::Server(404))
    }
}

fn default_reply(kind: ResourceKind) -> Reply {
    ResourceValue::placeholder(kind).ok_or(FetchError::Server(404))
}

#[async_trait]
impl Backend for MockBackend {
    async fn fetch_resource(&self, key: &ResourceKey) -> Result<ResourceValue, FetchError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        let _guard = ActiveGuard(&self.active);

        let step = {
            let mut state = self.state.lock();
            state.requested.push(key.clone());
            state.scripts.get_mut(&key.kind).and_then(VecDeque::pop_front)
        };

        match step {
            Some(Step::Ready(reply)) => reply,
            Some(Step::Gated(rx)) => rx
                .await
                .unwrap_or_else(|_| Err(FetchError::Network("gate dropped".into()))),
            None => default_reply(key.kind),
        }
    }

    async fn block_by_hash(&self, hash: &str) -> Result<Block, FetchError> {
        let hash = hash.to_lowercase();
        self.lookup(|s| s.block_delay, |s| s.blocks.get(&hash).cloned())
            .await
    }

    async fn block_by_height(&self, height: u64) -> Result<Block, FetchError> {
        self.lookup(|s| s.block_delay, |s| s.heights.get(&height).cloned())
            .await
    }

    async fn transaction(&self, hash: &str) -> Result<Transaction, FetchError> {
        let hash = hash.to_lowercase();
        self.lookup(|s| s.tx_delay, |s| s.transactions.get(&hash).cloned())
            .await
    }

    async fn address(&self, address: &str) -> Result<AddressInfo, FetchError> {
        let address = address.to_lowercase();
        self.lookup(|_| Duration::ZERO, |s| s.addresses.get(&address).cloned())
            .await
    }
}

pub fn block(number: u64, hash: &str) -> Block {
    serde_json::from_value(serde_json::json!({
        "number": number,
        "hash": hash,
        "txCount": 1,
        "timestamp": Utc.timestamp_opt(1_714_564_800 + number as i64 * 30, 0).unwrap(),
        "miner": "kalon1miner",
        "size": 1024,
        "difficulty": 1000
    }))
    .unwrap()
}

pub fn transaction(hash: &str, amount: u64) -> Transaction {
    serde_json::from_value(serde_json::json!({
        "hash": hash,
        "amount": amount,
        "timestamp": "2024-05-01T12:00:00Z",
        "from": "kalon1from",
        "to": "kalon1to"
    }))
    .unwrap()
}

pub fn address(value: &str, balance: u64) -> AddressInfo {
    serde_json::from_value(serde_json::json!({
        "address": value,
        "balance": balance,
        "txCount": 3
    }))
    .unwrap()
}

pub fn stats_value(height: u64) -> ResourceValue {
    ResourceValue::NetworkStats(NetworkStats {
        block_height: Some(height),
        ..NetworkStats::default()
    })
}

pub fn blocks_value(count: u64, total: u64) -> ResourceValue {
    let items = (1..=count).map(|n| block(n, &format!("{:064x}", n))).collect();
    ResourceValue::Blocks(Listing::new(items, Some(total)))
}

pub fn height_of(value: &Option<ResourceValue>) -> Option<u64> {
    value
        .as_ref()
        .and_then(|v| v.as_network_stats())
        .and_then(|s| s.block_height)
}

/// Poll `condition` on virtual time until it holds.
pub async fn eventually<F: FnMut() -> bool>(mut condition: F) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}
