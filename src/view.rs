//! Owned view state bound to the scheduler
//!
//! Each view instance holds its own paging state and subscriptions; nothing
//! here is global. Dropping a view unsubscribes everything it watched.

use crate::pagination::{Filters, ListingChange, ListingState, PaginationWindow};
use crate::resource::{QueryParams, ResourceKey, ResourceKind};
use crate::scheduler::{PollingScheduler, SharedState, Subscription};

/// A paged, filterable listing of blocks or transactions.
pub struct ListingView {
    scheduler: PollingScheduler,
    state: ListingState,
    subscription: Subscription,
}

impl ListingView {
    pub fn open(scheduler: &PollingScheduler, kind: ResourceKind, page_size: u32) -> Self {
        let state = ListingState::new(kind, page_size);
        let subscription = scheduler.subscribe(state.key());
        Self {
            scheduler: scheduler.clone(),
            state,
            subscription,
        }
    }

    pub fn listing(&self) -> &ListingState {
        &self.state
    }

    pub fn key(&self) -> &ResourceKey {
        self.subscription.key()
    }

    pub fn snapshot(&self) -> SharedState {
        self.subscription.state()
    }

    pub fn window(&self) -> Option<PaginationWindow> {
        self.state.window()
    }

    /// Wait for new data on the current page. Returns false once the
    /// scheduler is gone.
    pub async fn changed(&mut self) -> bool {
        if !self.subscription.changed().await {
            return false;
        }
        self.sync_total();
        true
    }

    pub fn go_to(&mut self, page: u32) -> ListingChange {
        let change = self.state.go_to(page);
        self.apply(change);
        change
    }

    pub fn next_page(&mut self) -> ListingChange {
        let change = self.state.next_page();
        self.apply(change);
        change
    }

    pub fn prev_page(&mut self) -> ListingChange {
        let change = self.state.prev_page();
        self.apply(change);
        change
    }

    pub fn set_page_size(&mut self, page_size: u32) -> ListingChange {
        let change = self.state.set_page_size(page_size);
        self.apply(change);
        change
    }

    pub fn set_search(&mut self, term: &str) -> ListingChange {
        let change = self.state.set_filters(Filters::search(term));
        self.apply(change);
        change
    }

    pub fn pause(&self) {
        self.subscription.pause();
    }

    pub fn resume(&self) {
        self.subscription.resume();
    }

    fn sync_total(&mut self) {
        let total = self
            .subscription
            .state()
            .value
            .as_ref()
            .and_then(|value| value.listing_total());
        if let Some(total) = total {
            let change = self.state.observe_total(total);
            self.apply(change);
        }
    }

    fn apply(&mut self, change: ListingChange) {
        if !change.key_changed {
            return;
        }
        let key = self.state.key();
        // Subscribe before releasing the old key so a shared entry is not
        // torn down and rebuilt in between.
        let subscription = self.scheduler.subscribe(key.clone());
        if change.invalidate {
            self.scheduler.invalidate(&key);
        }
        tracing::debug!(from = %self.subscription.key(), to = %key, "listing moved");
        self.subscription = subscription;
    }
}

/// Home page: network summary plus the latest blocks and transactions, each
/// refreshed on its own cadence and degrading independently.
pub struct Dashboard {
    pub network: Subscription,
    pub blocks: Subscription,
    pub transactions: Subscription,
}

/// Point-in-time copy of everything the dashboard renders.
#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    pub network: SharedState,
    pub blocks: SharedState,
    pub transactions: SharedState,
}

impl Dashboard {
    pub const RECENT_LIMIT: u32 = 5;

    pub fn keys() -> [ResourceKey; 3] {
        let recent = QueryParams::new().with("limit", Self::RECENT_LIMIT);
        [
            ResourceKey::plain(ResourceKind::NetworkStats),
            ResourceKey::new(ResourceKind::Blocks, recent.clone()),
            ResourceKey::new(ResourceKind::Transactions, recent),
        ]
    }

    pub fn open(scheduler: &PollingScheduler) -> Self {
        let [network, blocks, transactions] = Self::keys();
        Self {
            network: scheduler.subscribe(network),
            blocks: scheduler.subscribe(blocks),
            transactions: scheduler.subscribe(transactions),
        }
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            network: self.network.state(),
            blocks: self.blocks.state(),
            transactions: self.transactions.state(),
        }
    }

    /// Wait until any panel has new data.
    pub async fn changed(&mut self) -> bool {
        tokio::select! {
            ok = self.network.changed() => ok,
            ok = self.blocks.changed() => ok,
            ok = self.transactions.changed() => ok,
        }
    }

    pub fn pause(&self) {
        self.network.pause();
        self.blocks.pause();
        self.transactions.pause();
    }

    pub fn resume(&self) {
        self.network.resume();
        self.blocks.resume();
        self.transactions.resume();
    }
}
