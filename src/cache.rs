//! Cached resource state and staleness policy
//!
//! Provides:
//! - [`ResourceState`]: last good value per resource plus a degraded flag
//! - [`ResourceSlot`]: sequence gate that drops out-of-order responses
//! - [`BlockCache`]: LRU memo for immutable blocks fetched by search
use crate::error::FetchError;
use crate::models::Block;
use chrono::{DateTime, Utc};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceStatus {
    /// Created but no request issued yet.
    Idle,
    /// First request outstanding, nothing to show yet.
    Loading,
    Ready,
    /// Last request failed; any previous value is still served.
    Degraded,
}

/// Cached view of one backend resource.
///
/// `value` and `last_success_at` only change on a successful fetch. A failed
/// fetch flips `status` to [`ResourceStatus::Degraded`] and records the error
/// but never clears data that was already shown.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState<T> {
    pub status: ResourceStatus,
    pub value: Option<T>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<FetchError>,
    pub consecutive_failures: u32,
}

impl<T> Default for ResourceState<T> {
    fn default() -> Self {
        Self {
            status: ResourceStatus::Idle,
            value: None,
            last_success_at: None,
            last_error: None,
            consecutive_failures: 0,
        }
    }
}

impl<T> ResourceState<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A request was issued. Refreshes of data already on screen keep their
    /// status so views do not flicker back to a spinner.
    pub fn begin_loading(&mut self) {
        if self.status == ResourceStatus::Idle {
            self.status = ResourceStatus::Loading;
        }
    }

    pub fn apply_success(&mut self, value: T, at: DateTime<Utc>) {
        self.status = ResourceStatus::Ready;
        self.value = Some(value);
        self.last_success_at = Some(at);
        self.last_error = None;
        self.consecutive_failures = 0;
    }

    pub fn apply_failure(&mut self, error: FetchError) {
        self.status = ResourceStatus::Degraded;
        self.last_error = Some(error);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    /// Forget everything, e.g. when the query behind the resource changed.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_degraded(&self) -> bool {
        self.status == ResourceStatus::Degraded
    }

    /// Decide what a view should draw. `placeholder` is the static fallback
    /// used when the resource never loaded.
    pub fn display<'a>(&'a self, placeholder: Option<&'a T>) -> Presentation<'a, T> {
        match (&self.value, self.status) {
            (Some(value), ResourceStatus::Degraded) => Presentation::Stale {
                value,
                since: self.last_success_at,
                error: self.last_error.as_ref(),
            },
            (Some(value), _) => Presentation::Live(value),
            (None, ResourceStatus::Degraded) => Presentation::Placeholder {
                value: placeholder,
                error: self.last_error.as_ref(),
            },
            (None, _) => Presentation::Loading,
        }
    }
}

/// What to render for a resource. Never "nothing".
#[derive(Debug, PartialEq)]
pub enum Presentation<'a, T> {
    Loading,
    Live(&'a T),
    /// Last good value, with a warning that refreshing failed.
    Stale {
        value: &'a T,
        since: Option<DateTime<Utc>>,
        error: Option<&'a FetchError>,
    },
    /// Static fallback (or an explicit "unavailable" when there is none).
    Placeholder {
        value: Option<&'a T>,
        error: Option<&'a FetchError>,
    },
}

impl<'a, T> Presentation<'a, T> {
    /// Data to draw, if any.
    pub fn value(&self) -> Option<&'a T> {
        match self {
            Presentation::Loading => None,
            Presentation::Live(value) => Some(value),
            Presentation::Stale { value, .. } => Some(value),
            Presentation::Placeholder { value, .. } => *value,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Presentation::Stale { .. } | Presentation::Placeholder { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// A newer request was issued after this one; the response was dropped.
    Superseded,
}

/// Resource state guarded by the sequence number of the latest request.
///
/// Responses are applied only when they answer the most recently issued
/// request, so a slow early response can never overwrite a newer one.
#[derive(Debug, Clone)]
pub struct ResourceSlot<T> {
    state: ResourceState<T>,
    latest_seq: u64,
}

impl<T> Default for ResourceSlot<T> {
    fn default() -> Self {
        Self {
            state: ResourceState::default(),
            latest_seq: 0,
        }
    }
}

impl<T> ResourceSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ResourceState<T> {
        &self.state
    }

    pub fn latest_seq(&self) -> u64 {
        self.latest_seq
    }

    /// Record a newly issued request. `seq` must be greater than every
    /// sequence number issued before it.
    pub fn issue(&mut self, seq: u64) {
        debug_assert!(seq > self.latest_seq, "sequence numbers must increase");
        self.latest_seq = seq;
        self.state.begin_loading();
    }

    /// Drop the current value and issue `seq` as a fresh first load.
    pub fn invalidate(&mut self, seq: u64) {
        self.state.clear();
        self.issue(seq);
    }

    pub fn apply(
        &mut self,
        seq: u64,
        result: Result<T, FetchError>,
        at: DateTime<Utc>,
    ) -> ApplyOutcome {
        if seq != self.latest_seq {
            return ApplyOutcome::Superseded;
        }
        match result {
            Ok(value) => self.state.apply_success(value, at),
            Err(error) => self.state.apply_failure(error),
        }
        ApplyOutcome::Applied
    }
}

/// LRU memo for blocks. Blocks never change once mined, so a cached copy
/// stays valid; a read counts as a use and protects the block from eviction.
#[derive(Clone)]
pub struct BlockCache {
    inner: Arc<RwLock<LruCache<String, Block>>>,
}

impl BlockCache {
    pub const DEFAULT_CAPACITY: usize = 100;

    /// Zero capacity is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(RwLock::new(LruCache::new(capacity))),
        }
    }

    pub async fn get_block(&self, hash: &str) -> Option<Block> {
        // `LruCache::get` bumps recency, hence the write lock.
        self.inner.write().await.get(&block_cache_key(hash)).cloned()
    }

    pub async fn insert_block(&self, block: Block) {
        let key = block_cache_key(&block.hash);
        if let Some((evicted, _)) = self.inner.write().await.push(key.clone(), block) {
            if evicted != key {
                tracing::trace!(hash = %evicted, "block evicted from cache");
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn capacity(&self) -> usize {
        self.inner.read().await.cap().get()
    }

    /// `(entries, capacity)`
    pub async fn stats(&self) -> (usize, usize) {
        let cache = self.inner.read().await;
        (cache.len(), cache.cap().get())
    }
}

/// `0xABC..` and `abc..` name the same block.
fn block_cache_key(hash: &str) -> String {
    let hash = hash.trim();
    let hash = hash
        .strip_prefix("0x")
        .or_else(|| hash.strip_prefix("0X"))
        .unwrap_or(hash);
    hash.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn block(number: u64, hash: &str) -> Block {
        let mut block = crate::models::fallback_blocks().remove(0);
        block.number = number;
        block.hash = hash.to_string();
        block
    }

    #[test]
    fn test_failure_preserves_ready_value() {
        let mut state = ResourceState::new();
        state.begin_loading();
        assert_eq!(state.status, ResourceStatus::Loading);

        state.apply_success(7u32, at(0));
        state.apply_failure(FetchError::Network("refused".into()));

        assert_eq!(state.status, ResourceStatus::Degraded);
        assert_eq!(state.value, Some(7));
        assert_eq!(state.last_success_at, Some(at(0)));
        assert_eq!(state.consecutive_failures, 1);

        state.apply_success(8, at(10));
        assert_eq!(state.status, ResourceStatus::Ready);
        assert_eq!(state.consecutive_failures, 0);
        assert!(state.last_error.is_none());
    }

    #[test]
    fn test_refresh_does_not_flicker_to_loading() {
        let mut state = ResourceState::new();
        state.apply_success(1u32, at(0));
        state.begin_loading();
        assert_eq!(state.status, ResourceStatus::Ready);
    }

    #[test]
    fn test_display_fallbacks() {
        let placeholder = 0u32;
        let mut state = ResourceState::new();
        assert_eq!(state.display(Some(&placeholder)), Presentation::Loading);

        let err = FetchError::Timeout(std::time::Duration::from_secs(10));
        state.apply_failure(err.clone());
        assert_eq!(
            state.display(Some(&placeholder)),
            Presentation::Placeholder {
                value: Some(&placeholder),
                error: Some(&err)
            }
        );

        state.apply_success(5, at(0));
        assert_eq!(state.display(Some(&placeholder)), Presentation::Live(&5));

        state.apply_failure(err.clone());
        let shown = state.display(Some(&placeholder));
        assert!(shown.is_stale());
        assert_eq!(shown.value(), Some(&5));
    }

    #[test]
    fn test_slot_discards_superseded_response() {
        let mut slot = ResourceSlot::new();
        slot.issue(1);
        slot.issue(2);

        assert_eq!(slot.apply(2, Ok("second"), at(2)), ApplyOutcome::Applied);
        assert_eq!(slot.apply(1, Ok("first"), at(3)), ApplyOutcome::Superseded);
        assert_eq!(slot.state().value, Some("second"));
        assert_eq!(slot.state().last_success_at, Some(at(2)));
    }

    #[test]
    fn test_slot_invalidate_clears_value() {
        let mut slot = ResourceSlot::new();
        slot.issue(1);
        slot.apply(1, Ok(10u32), at(0));
        slot.invalidate(2);
        assert_eq!(slot.state().value, None);
        assert_eq!(slot.state().status, ResourceStatus::Loading);
        assert_eq!(slot.apply(1, Ok(11), at(1)), ApplyOutcome::Superseded);
    }

    #[tokio::test]
    async fn test_block_cache_normalizes_hash() {
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            let cache = BlockCache::new(10);
            cache.insert_block(block(1, "0xABCDEF")).await;
            assert_eq!(cache.get_block("abcdef").await.map(|b| b.number), Some(1));
            assert_eq!(cache.get_block("0xabcdef").await.map(|b| b.number), Some(1));
            assert!(cache.get_block("abcdee").await.is_none());
        })
        .await
        .expect("test_block_cache_normalizes_hash timed out");
    }

    #[tokio::test]
    async fn test_block_cache_lru_eviction() {
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            let cache = BlockCache::new(3);
            for i in 0..3u64 {
                cache.insert_block(block(i, &format!("{:064x}", i))).await;
            }
            assert_eq!(cache.stats().await, (3, 3));

            cache.insert_block(block(3, &format!("{:064x}", 3))).await;
            assert_eq!(cache.len().await, 3);
            assert!(cache.get_block(&format!("{:064x}", 0)).await.is_none());
            assert!(cache.get_block(&format!("{:064x}", 3)).await.is_some());
        })
        .await
        .expect("test_block_cache_lru_eviction timed out");
    }

    #[tokio::test]
    async fn test_block_cache_read_protects_from_eviction() {
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            let cache = BlockCache::new(3);
            let hash = |i: u64| format!("{:064x}", i);
            for i in 0..3u64 {
                cache.insert_block(block(i, &hash(i))).await;
            }

            // block 0 is the oldest insert but the most recent read
            assert!(cache.get_block(&hash(0)).await.is_some());
            cache.insert_block(block(3, &hash(3))).await;

            assert!(cache.get_block(&hash(0)).await.is_some());
            assert!(cache.get_block(&hash(1)).await.is_none());
            assert_eq!(cache.stats().await, (3, 3));
        })
        .await
        .expect("test_block_cache_read_protects_from_eviction timed out");
    }
}
