//! Polling scheduler for backend resources
//!
//! One [`PollingScheduler`] owns every periodically refreshed resource:
//! - one timer per [`ResourceKey`], started by the first subscriber and
//!   cancelled when the last one leaves
//! - at most one request in flight per key; ticks that land while a request
//!   is outstanding are skipped, not queued. This holds across teardown: a
//!   request left running by the last subscriber still blocks a re-created
//!   key until it returns
//! - responses are gated by a global request sequence number, so a response
//!   that was superseded, or that arrives after the key was torn down, never
//!   touches shared state
//! - failures degrade the cached state instead of clearing it
//!
//! Subscribers observe state changes through a `tokio::sync::watch` channel.

use crate::cache::{ApplyOutcome, ResourceSlot, ResourceState, ResourceStatus};
use crate::client::Backend;
use crate::config::PollingConfig;
use crate::error::FetchError;
use crate::resource::{ResourceKey, ResourceValue};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub type SharedState = ResourceState<ResourceValue>;

/// Polling lifecycle of a single key, as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Unsubscribed,
    Scheduled,
    Fetching,
}

struct InFlight {
    seq: u64,
    handle: JoinHandle<()>,
}

struct Entry {
    slot: ResourceSlot<ResourceValue>,
    tx: watch::Sender<SharedState>,
    /// Subscriber id -> paused.
    subscribers: HashMap<u64, bool>,
    in_flight: Option<InFlight>,
    timer: JoinHandle<()>,
}

impl Entry {
    fn all_paused(&self) -> bool {
        self.subscribers.values().all(|paused| *paused)
    }

    fn publish(&self) {
        self.tx.send_replace(self.slot.state().clone());
    }
}

impl Drop for Entry {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

#[derive(Default)]
struct Registry {
    entries: HashMap<ResourceKey, Entry>,
    /// Requests still running for keys whose last subscriber left. Their
    /// responses are discarded; until they return, no new request for the
    /// key is issued.
    orphans: HashMap<ResourceKey, InFlight>,
}

impl Registry {
    fn busy(&self, key: &ResourceKey) -> bool {
        self.orphans
            .get(key)
            .map_or(false, |orphan| !orphan.handle.is_finished())
            || self
                .entries
                .get(key)
                .map_or(false, |entry| entry.in_flight.is_some())
    }
}

struct Shared {
    backend: Arc<dyn Backend>,
    polling: PollingConfig,
    registry: Mutex<Registry>,
    next_seq: AtomicU64,
    next_subscriber: AtomicU64,
}

impl Shared {
    /// Timer callback. Returns false once the key is no longer scheduled.
    fn on_tick(self: &Arc<Self>, key: &ResourceKey) -> bool {
        let mut registry = self.registry.lock();
        let busy = registry.busy(key);
        let Some(entry) = registry.entries.get_mut(key) else {
            return false;
        };

        if busy {
            tracing::debug!(key = %key, "tick skipped, fetch still in flight");
        } else if entry.all_paused() {
            tracing::trace!(key = %key, "tick skipped, all subscribers paused");
        } else {
            self.start_fetch(key, entry, false);
        }
        true
    }

    /// Issue a request for `key`. With `fresh` the cached value is dropped
    /// first. Must be called with the registry lock held.
    fn start_fetch(self: &Arc<Self>, key: &ResourceKey, entry: &mut Entry, fresh: bool) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let status_before = entry.slot.state().status;
        if fresh {
            entry.slot.invalidate(seq);
        } else {
            entry.slot.issue(seq);
        }
        if fresh || entry.slot.state().status != status_before {
            entry.publish();
        }

        let backend = Arc::clone(&self.backend);
        let shared = Arc::downgrade(self);
        let request_key = key.clone();
        let handle = tokio::spawn(async move {
            let result = backend.fetch_resource(&request_key).await;
            match shared.upgrade() {
                Some(shared) => shared.complete(&request_key, seq, result),
                None => tracing::debug!(key = %request_key, seq, "scheduler gone, response dropped"),
            }
        });

        tracing::debug!(key = %key, seq, "fetch issued");
        entry.in_flight = Some(InFlight { seq, handle });
    }

    fn complete(self: &Arc<Self>, key: &ResourceKey, seq: u64, result: Result<ResourceValue, FetchError>) {
        let result = result.and_then(|value| {
            if value.kind() == key.kind {
                Ok(value)
            } else {
                Err(FetchError::Protocol(format!(
                    "expected {} payload, got {}",
                    key.kind,
                    value.kind()
                )))
            }
        });

        let mut registry = self.registry.lock();
        if registry.orphans.get(key).map(|f| f.seq) == Some(seq) {
            registry.orphans.remove(key);
            tracing::debug!(key = %key, seq, "response for unsubscribed key discarded");
            // A subscriber that arrived meanwhile has had no data yet.
            if let Some(entry) = registry.entries.get_mut(key) {
                if entry.slot.latest_seq() == 0 && entry.in_flight.is_none() && !entry.all_paused() {
                    self.start_fetch(key, entry, false);
                }
            }
            return;
        }

        let Some(entry) = registry.entries.get_mut(key) else {
            tracing::debug!(key = %key, seq, "response for unsubscribed key discarded");
            return;
        };

        if entry.in_flight.as_ref().map(|f| f.seq) == Some(seq) {
            entry.in_flight = None;
        }

        let error = result.as_ref().err().cloned();
        match entry.slot.apply(seq, result, Utc::now()) {
            ApplyOutcome::Superseded => {
                tracing::debug!(
                    key = %key,
                    seq,
                    latest = entry.slot.latest_seq(),
                    "superseded response discarded"
                );
            }
            ApplyOutcome::Applied => {
                if let Some(error) = error {
                    tracing::warn!(
                        key = %key,
                        kind = error.kind(),
                        failures = entry.slot.state().consecutive_failures,
                        error = %error,
                        "resource degraded"
                    );
                }
                entry.publish();
            }
        }
    }

    fn set_paused(self: &Arc<Self>, key: &ResourceKey, id: u64, paused: bool) {
        let mut registry = self.registry.lock();
        let busy = registry.busy(key);
        let Some(entry) = registry.entries.get_mut(key) else {
            return;
        };
        let was_idle = entry.all_paused();
        if let Some(flag) = entry.subscribers.get_mut(&id) {
            *flag = paused;
        }
        // Catch up right away instead of waiting out the rest of the period.
        if was_idle && !entry.all_paused() && !busy {
            self.start_fetch(key, entry, false);
        }
    }

    fn release(&self, key: &ResourceKey, id: u64) {
        let mut registry = self.registry.lock();
        let Some(entry) = registry.entries.get_mut(key) else {
            return;
        };
        entry.subscribers.remove(&id);
        if !entry.subscribers.is_empty() {
            return;
        }

        let in_flight = entry.in_flight.take();
        registry.entries.remove(key);
        if let Some(in_flight) = in_flight {
            tracing::debug!(key = %key, seq = in_flight.seq, "fetch left running after teardown");
            registry.orphans.insert(key.clone(), in_flight);
        }
        tracing::info!(key = %key, "last subscriber left, polling stopped");
    }
}

async fn run_timer(shared: Weak<Shared>, key: ResourceKey, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        // First tick completes immediately, giving new subscribers data
        // without waiting a full period.
        ticker.tick().await;
        let Some(shared) = shared.upgrade() else {
            break;
        };
        if !shared.on_tick(&key) {
            break;
        }
    }
}

/// Reference-counted periodic refresh of backend resources.
///
/// Cloning is cheap and yields a handle to the same scheduler. Methods that
/// start timers must be called from within a Tokio runtime.
#[derive(Clone)]
pub struct PollingScheduler {
    shared: Arc<Shared>,
}

impl PollingScheduler {
    pub fn new(backend: Arc<dyn Backend>, polling: PollingConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                backend,
                polling,
                registry: Mutex::new(Registry::default()),
                next_seq: AtomicU64::new(0),
                next_subscriber: AtomicU64::new(0),
            }),
        }
    }

    pub fn interval_for(&self, key: &ResourceKey) -> Duration {
        self.shared.polling.interval_for(key.kind)
    }

    /// Attach to `key`, starting its timer if nobody was watching it yet.
    pub fn subscribe(&self, key: ResourceKey) -> Subscription {
        let id = self.shared.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let mut registry = self.shared.registry.lock();

        let receiver = match registry.entries.get_mut(&key) {
            Some(entry) => {
                entry.subscribers.insert(id, false);
                tracing::debug!(key = %key, subscribers = entry.subscribers.len(), "joined existing poll");
                entry.tx.subscribe()
            }
            None => {
                let period = self.interval_for(&key);
                let (tx, receiver) = watch::channel(ResourceState::new());
                let timer = tokio::spawn(run_timer(
                    Arc::downgrade(&self.shared),
                    key.clone(),
                    period,
                ));
                registry.entries.insert(
                    key.clone(),
                    Entry {
                        slot: ResourceSlot::new(),
                        tx,
                        subscribers: HashMap::from([(id, false)]),
                        in_flight: None,
                        timer,
                    },
                );
                tracing::info!(key = %key, interval = ?period, "polling started");
                receiver
            }
        };

        Subscription {
            id,
            key,
            receiver,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Fetch now unless a request for `key` is already outstanding. Returns
    /// whether a request was issued.
    pub fn refresh_now(&self, key: &ResourceKey) -> bool {
        let mut registry = self.shared.registry.lock();
        if registry.busy(key) {
            return false;
        }
        match registry.entries.get_mut(key) {
            Some(entry) => {
                self.shared.start_fetch(key, entry, false);
                true
            }
            None => false,
        }
    }

    /// Drop the cached value for `key` and fetch again. An outstanding
    /// request, including one left over from before a teardown, is
    /// cancelled so that at most one remains in flight.
    pub fn invalidate(&self, key: &ResourceKey) -> bool {
        let mut registry = self.shared.registry.lock();
        if !registry.entries.contains_key(key) {
            return false;
        }
        let orphan = registry.orphans.remove(key);
        let Some(entry) = registry.entries.get_mut(key) else {
            return false;
        };
        for previous in orphan.into_iter().chain(entry.in_flight.take()) {
            previous.handle.abort();
            tracing::debug!(key = %key, seq = previous.seq, "in-flight fetch cancelled");
        }
        self.shared.start_fetch(key, entry, true);
        true
    }

    pub fn snapshot(&self, key: &ResourceKey) -> Option<SharedState> {
        self.shared
            .registry
            .lock()
            .entries
            .get(key)
            .map(|entry| entry.slot.state().clone())
    }

    /// `Fetching` also covers a request left running from before the key
    /// was last torn down.
    pub fn phase(&self, key: &ResourceKey) -> PollPhase {
        let registry = self.shared.registry.lock();
        if !registry.entries.contains_key(key) {
            PollPhase::Unsubscribed
        } else if registry.busy(key) {
            PollPhase::Fetching
        } else {
            PollPhase::Scheduled
        }
    }

    /// Whether any request for `key` is outstanding, subscribed or not.
    pub fn is_in_flight(&self, key: &ResourceKey) -> bool {
        self.shared.registry.lock().busy(key)
    }

    pub fn subscriber_count(&self, key: &ResourceKey) -> usize {
        self.shared
            .registry
            .lock()
            .entries
            .get(key)
            .map_or(0, |entry| entry.subscribers.len())
    }

    pub fn active_keys(&self) -> Vec<ResourceKey> {
        let mut keys: Vec<_> = self.shared.registry.lock().entries.keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Handle held by a view while it displays a resource. Dropping it
/// unsubscribes.
pub struct Subscription {
    id: u64,
    key: ResourceKey,
    receiver: watch::Receiver<SharedState>,
    shared: Weak<Shared>,
}

impl Subscription {
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// Latest published state.
    pub fn state(&self) -> SharedState {
        self.receiver.borrow().clone()
    }

    pub fn status(&self) -> ResourceStatus {
        self.receiver.borrow().status
    }

    /// Wait for the next published state. Returns false once the scheduler
    /// is gone.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    /// Wait until `predicate` holds for the published state.
    pub async fn wait_for<F>(&mut self, mut predicate: F) -> Option<SharedState>
    where
        F: FnMut(&SharedState) -> bool,
    {
        self.receiver
            .wait_for(|state| predicate(state))
            .await
            .ok()
            .map(|state| (*state).clone())
    }

    /// Stop this view from driving refreshes. The key keeps polling while
    /// any other subscriber is active.
    pub fn pause(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.set_paused(&self.key, self.id, true);
        }
    }

    pub fn resume(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.set_paused(&self.key, self.id, false);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("key", &self.key)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.release(&self.key, self.id);
        }
    }
}
