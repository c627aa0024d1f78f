//! Wire types returned by the Kalon explorer API
//!
//! All payloads travel inside an [`Envelope`]. Numeric fields that the backend
//! may omit are `Option`s so "absent" stays distinguishable from "zero" at the
//! data layer; formatters decide how to render the difference.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// `{success, data?, error?, meta?}` wrapper around every response body.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub meta: Option<Meta>,
}

/// Pagination metadata attached to list responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub total_pages: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub number: u64,
    pub hash: String,
    #[serde(default)]
    pub tx_count: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub miner: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub difficulty: u64,
    #[serde(default)]
    pub parent_hash: Option<String>,
    #[serde(default)]
    pub nonce: Option<u64>,
    #[serde(default)]
    pub merkle_root: Option<String>,
    #[serde(default)]
    pub network_fee: Option<u64>,
    #[serde(default)]
    pub treasury_fee: Option<u64>,
    #[serde(default)]
    pub transactions: Option<Vec<Transaction>>,
}

/// Amounts are in micro-units (1e-6 of the display currency).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: String,
    pub amount: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub fee: Option<u64>,
    #[serde(default)]
    pub block_hash: Option<String>,
    #[serde(default)]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Unconfirmed transaction as listed by `/transactions/pending`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MempoolTx {
    pub hash: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    pub amount: u64,
    #[serde(default)]
    pub fee: Option<u64>,
    #[serde(default)]
    pub gas_price: Option<u64>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub priority: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInfo {
    pub address: String,
    #[serde(default)]
    pub balance: Option<u64>,
    #[serde(default)]
    pub tx_count: Option<u64>,
    #[serde(default)]
    pub first_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_contract: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AddressBalance {
    pub address: String,
    pub balance: u64,
    #[serde(default)]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreasuryInfo {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub balance: Option<u64>,
    #[serde(default)]
    pub block_fees: Option<u64>,
    #[serde(default)]
    pub tx_fees: Option<u64>,
    #[serde(default)]
    pub total_income: Option<u64>,
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStats {
    #[serde(default)]
    pub block_height: Option<u64>,
    #[serde(default)]
    pub total_blocks: Option<u64>,
    #[serde(default)]
    pub total_txs: Option<u64>,
    #[serde(default)]
    pub total_addresses: Option<u64>,
    #[serde(default)]
    pub network_hash_rate: Option<f64>,
    #[serde(default)]
    pub difficulty: Option<u64>,
    /// Average block time in seconds.
    #[serde(default)]
    pub block_time: Option<f64>,
    #[serde(default)]
    pub last_block_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub peers: Option<u64>,
    #[serde(default)]
    pub mempool_size: Option<u64>,
}

impl NetworkStats {
    /// Values shown by the dashboard while the backend has never answered.
    pub fn placeholder() -> Self {
        Self {
            block_height: Some(0),
            total_blocks: Some(1),
            total_txs: Some(0),
            total_addresses: Some(0),
            network_hash_rate: Some(0.0),
            difficulty: Some(1000),
            block_time: None,
            last_block_time: None,
            peers: Some(0),
            mempool_size: Some(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PeerInfo {
    pub id: String,
    pub address: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub height: Option<u64>,
    /// Round-trip latency in milliseconds.
    #[serde(default)]
    pub latency: Option<u64>,
}

/// Aggregate counters from `/stats`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ChainStats {
    #[serde(default)]
    pub blocks: BlockCounts,
    #[serde(default)]
    pub transactions: TxCounts,
    #[serde(default)]
    pub addresses: AddressCounts,
    #[serde(default)]
    pub network: NetworkSummary,
    #[serde(default)]
    pub treasury: TreasurySummary,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BlockCounts {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub latest: Option<u64>,
    #[serde(default)]
    pub pending: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TxCounts {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub pending: Option<u64>,
    #[serde(default)]
    pub confirmed: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AddressCounts {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub active: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSummary {
    #[serde(default)]
    pub hash_rate: Option<f64>,
    #[serde(default)]
    pub difficulty: Option<u64>,
    #[serde(default)]
    pub block_time: Option<f64>,
    #[serde(default)]
    pub peers: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreasurySummary {
    #[serde(default)]
    pub balance: Option<u64>,
    #[serde(default)]
    pub block_fees: Option<u64>,
    #[serde(default)]
    pub tx_fees: Option<u64>,
}

/// Answer of the backend's `/search?q=` classifier.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SearchHit {
    pub query: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl SearchHit {
    /// The classifier answers `"unknown"` when it has no guess.
    pub fn is_match(&self) -> bool {
        !self.kind.is_empty() && self.kind != "unknown"
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Health {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Three recent-looking blocks rendered when the block list never loaded.
pub fn fallback_blocks() -> Vec<Block> {
    let now = Utc::now();
    [
        (1, "0x1234567890abcdef1234567890abcdef12345678", 1, 0),
        (2, "0xabcdef1234567890abcdef1234567890abcdef12", 0, 12),
        (3, "0x9876543210fedcba9876543210fedcba98765432", 2, 24),
    ]
    .into_iter()
    .map(|(number, hash, tx_count, age_secs)| Block {
        number,
        hash: hash.to_string(),
        tx_count,
        timestamp: now - Duration::seconds(age_secs),
        miner: String::new(),
        size: 0,
        difficulty: 0,
        parent_hash: None,
        nonce: None,
        merkle_root: None,
        network_fee: None,
        treasury_fee: None,
        transactions: None,
    })
    .collect()
}
