//! Free-text search resolution
//!
//! A query is classified without I/O first ([`classify`]). Only the hash case
//! needs the backend: block and transaction hashes share one format, so both
//! lookups are raced and the first affirmative answer wins, with the block
//! taking precedence when both answer in the same poll.

use crate::cache::BlockCache;
use crate::client::Backend;
use crate::error::{FetchError, SearchError};
use crate::models::{AddressInfo, Block, Transaction};
use std::sync::Arc;

/// Hex digits in a block or transaction hash.
pub const HASH_HEX_LEN: usize = 64;
/// Hex digits in a raw 20-byte address.
pub const ADDRESS_HEX_LEN: usize = 40;
/// Data part (payload plus checksum) of a bech32 address over 20 bytes.
pub const BECH32_DATA_LEN: usize = 38;
const BECH32_CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const MAX_HRP_LEN: usize = 20;

/// Shape of a query, decided without touching the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryClass {
    Height(u64),
    /// Block or transaction hash; which one needs a lookup.
    Hash(String),
    Address(String),
    Unrecognized(String),
}

/// Where a query resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchTarget {
    BlockByHeight(u64),
    BlockByHash(String),
    TransactionByHash(String),
    AddressByValue(String),
    /// Normalized query that matched nothing.
    NotFound(String),
}

/// Entity the caller should navigate to.
#[derive(Debug, Clone, PartialEq)]
pub enum Navigation {
    Block(Block),
    Transaction(Transaction),
    Address(AddressInfo),
}

/// Classify a raw query. Input is trimmed and lowercased; the first matching
/// rule wins: integer height, hash, address, otherwise unrecognized.
pub fn classify(raw: &str) -> Result<QueryClass, SearchError> {
    let query = raw.trim().to_ascii_lowercase();
    if query.is_empty() {
        return Err(SearchError::InvalidQuery("empty query".to_string()));
    }

    if query.bytes().all(|b| b.is_ascii_digit()) {
        // Digit strings too large for a height may still be hex.
        if let Ok(height) = query.parse::<u64>() {
            return Ok(QueryClass::Height(height));
        }
    }

    if is_hex_of_len(&query, HASH_HEX_LEN) {
        return Ok(QueryClass::Hash(query));
    }

    if is_address(&query) {
        return Ok(QueryClass::Address(query));
    }

    Ok(QueryClass::Unrecognized(query))
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}

fn is_hex_of_len(s: &str, len: usize) -> bool {
    let digits = strip_hex_prefix(s);
    digits.len() == len && hex::decode(digits).is_ok()
}

/// Raw hex address or a bech32-shaped `hrp1...` string. The checksum is not
/// verified; the backend is the authority on whether the address exists.
pub fn is_address(s: &str) -> bool {
    if is_hex_of_len(s, ADDRESS_HEX_LEN) {
        return true;
    }
    let Some((hrp, data)) = s.rsplit_once('1') else {
        return false;
    };
    !hrp.is_empty()
        && hrp.len() <= MAX_HRP_LEN
        && hrp.bytes().all(|b| b.is_ascii_lowercase())
        && data.len() == BECH32_DATA_LEN
        && data.chars().all(|c| BECH32_CHARSET.contains(c))
}

/// Lookups the backend reports as "no such entity".
fn is_absent(err: &FetchError) -> bool {
    err.is_not_found() || matches!(err, FetchError::Server(400))
}

enum HashHit {
    Block(Block),
    Transaction(Transaction),
}

/// Resolves queries against a [`Backend`], memoizing blocks it fetches.
#[derive(Clone)]
pub struct SearchResolver {
    backend: Arc<dyn Backend>,
    blocks: BlockCache,
}

impl SearchResolver {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self::with_cache(backend, BlockCache::new(BlockCache::DEFAULT_CAPACITY))
    }

    pub fn with_cache(backend: Arc<dyn Backend>, blocks: BlockCache) -> Self {
        Self { backend, blocks }
    }

    pub fn block_cache(&self) -> &BlockCache {
        &self.blocks
    }

    /// Map a query to exactly one target.
    pub async fn resolve(&self, raw: &str) -> Result<SearchTarget, SearchError> {
        Ok(self.resolve_inner(raw).await?.0)
    }

    /// Resolve and fetch in one step.
    pub async fn search(&self, raw: &str) -> Result<Navigation, SearchError> {
        match self.resolve_inner(raw).await? {
            (_, Some(found)) => Ok(found),
            (SearchTarget::NotFound(_), None) => Err(SearchError::NotFound(raw.trim().to_string())),
            (target, None) => self.execute(target).await,
        }
    }

    /// Fetch the entity behind a resolved target.
    pub async fn execute(&self, target: SearchTarget) -> Result<Navigation, SearchError> {
        match target {
            SearchTarget::BlockByHeight(height) => {
                let block = self
                    .backend
                    .block_by_height(height)
                    .await
                    .map_err(|e| lookup_error(e, &height.to_string()))?;
                Ok(Navigation::Block(self.remember(block).await))
            }
            SearchTarget::BlockByHash(hash) => self.block_by_hash(&hash).await.map(Navigation::Block),
            SearchTarget::TransactionByHash(hash) => self
                .backend
                .transaction(&hash)
                .await
                .map(Navigation::Transaction)
                .map_err(|e| lookup_error(e, &hash)),
            SearchTarget::AddressByValue(address) => self
                .backend
                .address(&address)
                .await
                .map(Navigation::Address)
                .map_err(|e| lookup_error(e, &address)),
            SearchTarget::NotFound(query) => Err(SearchError::NotFound(query)),
        }
    }

    async fn remember(&self, block: Block) -> Block {
        self.blocks.insert_block(block.clone()).await;
        block
    }

    async fn block_by_hash(&self, hash: &str) -> Result<Block, SearchError> {
        if let Some(block) = self.blocks.get_block(hash).await {
            return Ok(block);
        }
        let block = self
            .backend
            .block_by_hash(hash)
            .await
            .map_err(|e| lookup_error(e, hash))?;
        Ok(self.remember(block).await)
    }

    async fn resolve_inner(
        &self,
        raw: &str,
    ) -> Result<(SearchTarget, Option<Navigation>), SearchError> {
        let class = classify(raw)?;
        tracing::debug!(query = raw.trim(), class = ?class, "search classified");

        match class {
            QueryClass::Height(height) => Ok((SearchTarget::BlockByHeight(height), None)),
            QueryClass::Address(address) => Ok((SearchTarget::AddressByValue(address), None)),
            QueryClass::Unrecognized(query) => Ok((SearchTarget::NotFound(query), None)),
            QueryClass::Hash(hash) => match self.race_hash(&hash).await {
                Ok(HashHit::Block(block)) => Ok((
                    SearchTarget::BlockByHash(hash),
                    Some(Navigation::Block(block)),
                )),
                Ok(HashHit::Transaction(tx)) => Ok((
                    SearchTarget::TransactionByHash(hash),
                    Some(Navigation::Transaction(tx)),
                )),
                // Neither lookup affirmed: fall through to the address rule.
                Err(transport) => {
                    if is_address(&hash) {
                        Ok((SearchTarget::AddressByValue(hash), None))
                    } else if let Some(err) = transport {
                        Err(SearchError::Unavailable(err))
                    } else {
                        Ok((SearchTarget::NotFound(hash), None))
                    }
                }
            },
        }
    }

    /// Look the hash up as a block and as a transaction concurrently. On
    /// failure returns the first transport error seen, if any, so a dead
    /// backend is not reported as "nothing found".
    async fn race_hash(&self, hash: &str) -> Result<HashHit, Option<FetchError>> {
        if let Some(block) = self.blocks.get_block(hash).await {
            return Ok(HashHit::Block(block));
        }

        let block = self.backend.block_by_hash(hash);
        let tx = self.backend.transaction(hash);
        tokio::pin!(block, tx);

        let mut block_done = false;
        let mut tx_done = false;
        let mut transport = None;

        loop {
            tokio::select! {
                biased;

                res = &mut block, if !block_done => {
                    block_done = true;
                    match res {
                        Ok(found) => {
                            self.blocks.insert_block(found.clone()).await;
                            return Ok(HashHit::Block(found));
                        }
                        Err(e) if !is_absent(&e) => { transport.get_or_insert(e); }
                        Err(_) => {}
                    }
                }
                res = &mut tx, if !tx_done => {
                    tx_done = true;
                    match res {
                        Ok(found) => return Ok(HashHit::Transaction(found)),
                        Err(e) if !is_absent(&e) => { transport.get_or_insert(e); }
                        Err(_) => {}
                    }
                }
                else => break,
            }
        }

        tracing::debug!(hash, "hash matched neither a block nor a transaction");
        Err(transport)
    }
}

fn lookup_error(err: FetchError, what: &str) -> SearchError {
    if is_absent(&err) {
        SearchError::NotFound(what.to_string())
    } else {
        SearchError::Unavailable(err)
    }
}
