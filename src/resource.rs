//! Identity of pollable backend resources
//!
//! A [`ResourceKey`] is the unit of de-duplication for the polling scheduler:
//! two views asking for the same kind with the same canonical parameters share
//! one timer, one in-flight request and one cached state.

use crate::models::{Block, ChainStats, MempoolTx, NetworkStats, PeerInfo, Transaction, TreasuryInfo};
use std::collections::BTreeMap;
use std::fmt;

/// Backend collections that can be polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Blocks,
    Transactions,
    PendingTransactions,
    LatestBlock,
    NetworkStats,
    Peers,
    Treasury,
    Stats,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 8] = [
        ResourceKind::Blocks,
        ResourceKind::Transactions,
        ResourceKind::PendingTransactions,
        ResourceKind::LatestBlock,
        ResourceKind::NetworkStats,
        ResourceKind::Peers,
        ResourceKind::Treasury,
        ResourceKind::Stats,
    ];

    /// Path of the collection relative to the API base URL.
    pub fn path(&self) -> &'static str {
        match self {
            ResourceKind::Blocks => "/blocks",
            ResourceKind::Transactions => "/transactions",
            ResourceKind::PendingTransactions => "/transactions/pending",
            ResourceKind::LatestBlock => "/blocks/latest",
            ResourceKind::NetworkStats => "/network/stats",
            ResourceKind::Peers => "/network/peers",
            ResourceKind::Treasury => "/treasury",
            ResourceKind::Stats => "/stats",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ResourceKind::Blocks => "blocks",
            ResourceKind::Transactions => "transactions",
            ResourceKind::PendingTransactions => "pending_transactions",
            ResourceKind::LatestBlock => "latest_block",
            ResourceKind::NetworkStats => "network_stats",
            ResourceKind::Peers => "peers",
            ResourceKind::Treasury => "treasury",
            ResourceKind::Stats => "stats",
        }
    }

    pub fn from_name(name: &str) -> Option<ResourceKind> {
        ResourceKind::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Whether the collection is paginated and accepts `page`/`limit`.
    pub fn is_paged(&self) -> bool {
        matches!(self, ResourceKind::Blocks | ResourceKind::Transactions)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Query parameters in canonical form.
///
/// Keys are kept sorted, values are trimmed and empty values are dropped, so
/// `{limit: 5, search: ""}` and `{limit: " 5 "}` are the same request on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert. Empty values remove the key.
    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl ToString) {
        let value = value.to_string();
        let value = value.trim();
        if value.is_empty() {
            self.0.remove(key);
        } else {
            self.0.insert(key.to_string(), value.to_string());
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates in stable (sorted) key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str("&")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        Ok(())
    }
}

/// Identity of a pollable backend query: kind plus canonical parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub kind: ResourceKind,
    pub params: QueryParams,
}

impl ResourceKey {
    pub fn new(kind: ResourceKind, params: QueryParams) -> Self {
        Self { kind, params }
    }

    /// Key without parameters (stats, treasury, ...).
    pub fn plain(kind: ResourceKind) -> Self {
        Self::new(kind, QueryParams::new())
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.params.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}?{}", self.kind, self.params)
        }
    }
}

/// One page of a paginated collection together with the server-reported total.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing<T> {
    pub items: Vec<T>,
    /// `meta.total` when the backend reported it.
    pub total: Option<u64>,
}

impl<T> Listing<T> {
    pub fn new(items: Vec<T>, total: Option<u64>) -> Self {
        Self { items, total }
    }

    /// Total item count, falling back to the page length when the backend
    /// omitted `meta.total`.
    pub fn total_or_len(&self) -> u64 {
        self.total.unwrap_or(self.items.len() as u64)
    }
}

/// Decoded payload of a pollable resource.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceValue {
    Blocks(Listing<Block>),
    Transactions(Listing<Transaction>),
    PendingTransactions(Vec<MempoolTx>),
    LatestBlock(Block),
    NetworkStats(NetworkStats),
    Peers(Vec<PeerInfo>),
    Treasury(TreasuryInfo),
    Stats(ChainStats),
}

impl ResourceValue {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceValue::Blocks(_) => ResourceKind::Blocks,
            ResourceValue::Transactions(_) => ResourceKind::Transactions,
            ResourceValue::PendingTransactions(_) => ResourceKind::PendingTransactions,
            ResourceValue::LatestBlock(_) => ResourceKind::LatestBlock,
            ResourceValue::NetworkStats(_) => ResourceKind::NetworkStats,
            ResourceValue::Peers(_) => ResourceKind::Peers,
            ResourceValue::Treasury(_) => ResourceKind::Treasury,
            ResourceValue::Stats(_) => ResourceKind::Stats,
        }
    }

    pub fn as_blocks(&self) -> Option<&Listing<Block>> {
        match self {
            ResourceValue::Blocks(listing) => Some(listing),
            _ => None,
        }
    }

    pub fn as_transactions(&self) -> Option<&Listing<Transaction>> {
        match self {
            ResourceValue::Transactions(listing) => Some(listing),
            _ => None,
        }
    }

    pub fn as_network_stats(&self) -> Option<&NetworkStats> {
        match self {
            ResourceValue::NetworkStats(stats) => Some(stats),
            _ => None,
        }
    }

    pub fn as_treasury(&self) -> Option<&TreasuryInfo> {
        match self {
            ResourceValue::Treasury(treasury) => Some(treasury),
            _ => None,
        }
    }

    /// Server-reported total for paged collections.
    pub fn listing_total(&self) -> Option<u64> {
        match self {
            ResourceValue::Blocks(listing) => Some(listing.total_or_len()),
            ResourceValue::Transactions(listing) => Some(listing.total_or_len()),
            _ => None,
        }
    }

    /// Static fallback rendered when a resource has never loaded.
    pub fn placeholder(kind: ResourceKind) -> Option<ResourceValue> {
        match kind {
            ResourceKind::Blocks => Some(ResourceValue::Blocks(Listing::new(
                crate::models::fallback_blocks(),
                None,
            ))),
            ResourceKind::NetworkStats => {
                Some(ResourceValue::NetworkStats(NetworkStats::placeholder()))
            }
            ResourceKind::Transactions => {
                Some(ResourceValue::Transactions(Listing::new(Vec::new(), Some(0))))
            }
            ResourceKind::PendingTransactions => Some(ResourceValue::PendingTransactions(Vec::new())),
            ResourceKind::Peers => Some(ResourceValue::Peers(Vec::new())),
            ResourceKind::Treasury => Some(ResourceValue::Treasury(TreasuryInfo::default())),
            ResourceKind::Stats => Some(ResourceValue::Stats(ChainStats::default())),
            ResourceKind::LatestBlock => None,
        }
    }
}
