//! Entity Store for promptshelf.
//!
//! Process-local cache of the last-known server state of bookmarks, likes
//! and categories, shared by every UI surface of a session. Each entity keeps
//! its authoritative server value plus a queue of speculative layers pushed by
//! the optimistic mutator; readers see the server value with all queued layers
//! applied in submission order.
//!
//! Only the head layer of an entity has a request in flight. Later layers
//! wait for it and are re-applied on top of whatever the head resolves to.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tokio::sync::oneshot;

use crate::managers::subscription_bus::SubscriptionBus;
use crate::types::bookmark::{Bookmark, BookmarkCategory};
use crate::types::entity::{ChangePhase, EntityEvent, EntityKind, EntitySnapshot};
use crate::types::like::LikeState;

/// A value type the store can hold and publish.
pub trait StoredEntity: Clone + PartialEq + Send + Sync + 'static {
    const KIND: EntityKind;

    fn snapshot(value: Option<Self>) -> EntitySnapshot;
}

impl StoredEntity for Bookmark {
    const KIND: EntityKind = EntityKind::Bookmark;

    fn snapshot(value: Option<Self>) -> EntitySnapshot {
        EntitySnapshot::Bookmark(value)
    }
}

impl StoredEntity for LikeState {
    const KIND: EntityKind = EntityKind::Like;

    fn snapshot(value: Option<Self>) -> EntitySnapshot {
        EntitySnapshot::Like(value)
    }
}

/// Pure state transition of one speculative layer. May run several times.
pub type MutateFn<T> = Arc<dyn Fn(Option<&T>) -> Option<T> + Send + Sync>;

struct PendingLayer<T> {
    seq: u64,
    mutate: MutateFn<T>,
}

struct Entry<T> {
    server: Option<T>,
    /// Epoch of the last write to `server`.
    written_at: u64,
    pending: VecDeque<PendingLayer<T>>,
    view: Option<T>,
    /// Completion signal of the most recently queued layer.
    tail: Option<oneshot::Receiver<()>>,
}

impl<T: StoredEntity> Entry<T> {
    fn new(server: Option<T>, written_at: u64) -> Self {
        let mut entry = Self {
            server,
            written_at,
            pending: VecDeque::new(),
            view: None,
            tail: None,
        };
        entry.recompute();
        entry
    }

    fn recompute(&mut self) {
        let mut value = self.server.clone();
        for layer in &self.pending {
            value = (layer.mutate)(value.as_ref());
        }
        self.view = value;
    }

    fn is_vacant(&self) -> bool {
        self.server.is_none() && self.pending.is_empty()
    }
}

struct TableState<T> {
    entries: HashMap<String, Entry<T>>,
    next_seq: u64,
    epoch: u64,
    last_refresh: u64,
    generation: u64,
}

/// Handle for one queued speculative layer, consumed by the mutator.
pub struct LayerTicket {
    pub entity_id: String,
    pub seq: u64,
    generation: u64,
    previous: Option<oneshot::Receiver<()>>,
    done: oneshot::Sender<()>,
}

impl LayerTicket {
    /// Waits until every earlier layer on the same entity has resolved.
    pub async fn wait_turn(&mut self) {
        if let Some(previous) = self.previous.take() {
            // An error only means the earlier task is gone, which also ends its turn.
            let _ = previous.await;
        }
    }

    /// Lets the next queued layer dispatch its request.
    pub fn finish(self) {
        let _ = self.done.send(());
    }
}

/// Marks the start of a list refresh; see [`EntityTable::apply_refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshToken(u64);

/// One table of the store (bookmarks keyed by content id, likes keyed by
/// content id).
pub struct EntityTable<T> {
    state: Mutex<TableState<T>>,
    bus: Arc<SubscriptionBus>,
}

impl<T: StoredEntity> EntityTable<T> {
    pub fn new(bus: Arc<SubscriptionBus>) -> Self {
        Self {
            state: Mutex::new(TableState {
                entries: HashMap::new(),
                next_seq: 0,
                epoch: 0,
                last_refresh: 0,
                generation: 0,
            }),
            bus,
        }
    }

    fn state(&self) -> MutexGuard<'_, TableState<T>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn event(&self, id: &str, phase: ChangePhase, view: Option<T>) -> EntityEvent {
        EntityEvent {
            kind: T::KIND,
            id: Some(id.to_string()),
            phase,
            version: self.bus.next_version(),
            snapshot: T::snapshot(view),
        }
    }

    /// Current value as the UI should render it (speculative layers applied).
    pub fn get(&self, id: &str) -> Option<T> {
        self.state().entries.get(id).and_then(|e| e.view.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state()
            .entries
            .get(id)
            .is_some_and(|e| e.view.is_some())
    }

    /// Last value confirmed by the server.
    pub fn server_value(&self, id: &str) -> Option<T> {
        self.state().entries.get(id).and_then(|e| e.server.clone())
    }

    /// Number of queued layers (in flight plus waiting) on one entity.
    pub fn pending_count(&self, id: &str) -> usize {
        self.state().entries.get(id).map_or(0, |e| e.pending.len())
    }

    /// All present values with their ids.
    pub fn entries(&self) -> Vec<(String, T)> {
        self.state()
            .entries
            .iter()
            .filter_map(|(id, e)| e.view.clone().map(|v| (id.clone(), v)))
            .collect()
    }

    pub fn values(&self) -> Vec<T> {
        self.state()
            .entries
            .values()
            .filter_map(|e| e.view.clone())
            .collect()
    }

    /// First present entity matching `predicate`.
    pub fn find<P>(&self, predicate: P) -> Option<(String, T)>
    where
        P: Fn(&T) -> bool,
    {
        self.state().entries.iter().find_map(|(id, e)| match &e.view {
            Some(v) if predicate(v) => Some((id.clone(), v.clone())),
            _ => None,
        })
    }

    /// Queues a speculative layer and publishes the resulting view.
    pub fn push_layer(&self, id: &str, mutate: MutateFn<T>) -> LayerTicket {
        let (ticket, event) = {
            let mut state = self.state();
            state.next_seq += 1;
            let seq = state.next_seq;
            let generation = state.generation;
            let (done, rx) = oneshot::channel();

            let entry = state
                .entries
                .entry(id.to_string())
                .or_insert_with(|| Entry::new(None, 0));
            entry.pending.push_back(PendingLayer { seq, mutate });
            entry.recompute();
            let previous = entry.tail.replace(rx);
            let view = entry.view.clone();

            let ticket = LayerTicket {
                entity_id: id.to_string(),
                seq,
                generation,
                previous,
                done,
            };
            (ticket, self.event(id, ChangePhase::Speculative, view))
        };
        tracing::debug!(kind = %T::KIND, id, seq = ticket.seq, "speculative layer applied");
        self.bus.publish(event);
        ticket
    }

    /// Replaces the server value with the authoritative one and drops the
    /// layer. Ignored if the store was cleared since the layer was queued.
    pub fn reconcile(&self, ticket: &LayerTicket, authoritative: Option<T>) -> Option<T> {
        let (event, view) = {
            let mut state = self.state();
            if state.generation != ticket.generation {
                return None;
            }
            state.epoch += 1;
            let epoch = state.epoch;
            let entry = state.entries.get_mut(&ticket.entity_id)?;
            entry.server = authoritative;
            entry.written_at = epoch;
            entry.pending.retain(|layer| layer.seq != ticket.seq);
            entry.recompute();
            let view = entry.view.clone();
            (
                self.event(&ticket.entity_id, ChangePhase::Reconciled, view.clone()),
                view,
            )
        };
        tracing::debug!(kind = %T::KIND, id = %ticket.entity_id, seq = ticket.seq, "layer reconciled");
        self.bus.publish(event);
        view
    }

    /// Withdraws the layer; the view falls back to the server value with the
    /// remaining layers re-applied.
    pub fn rollback(&self, ticket: &LayerTicket) {
        let event = {
            let mut state = self.state();
            if state.generation != ticket.generation {
                return;
            }
            let Some(entry) = state.entries.get_mut(&ticket.entity_id) else {
                return;
            };
            entry.pending.retain(|layer| layer.seq != ticket.seq);
            entry.recompute();
            let view = entry.view.clone();
            if entry.is_vacant() && entry.written_at == 0 {
                state.entries.remove(&ticket.entity_id);
            }
            self.event(&ticket.entity_id, ChangePhase::RolledBack, view)
        };
        tracing::debug!(kind = %T::KIND, id = %ticket.entity_id, seq = ticket.seq, "layer rolled back");
        self.bus.publish(event);
    }

    /// Records a server value obtained outside a mutation (e.g. the like
    /// state delivered with a content detail). Queued layers stay on top.
    pub fn seed(&self, id: &str, value: T) {
        let event = {
            let mut state = self.state();
            state.epoch += 1;
            let epoch = state.epoch;
            let entry = state
                .entries
                .entry(id.to_string())
                .or_insert_with(|| Entry::new(None, 0));
            if entry.server.as_ref() == Some(&value) {
                return;
            }
            entry.server = Some(value);
            entry.written_at = epoch;
            entry.recompute();
            let view = entry.view.clone();
            self.event(id, ChangePhase::Refreshed, view)
        };
        self.bus.publish(event);
    }

    /// Marks the start of a list fetch.
    pub fn begin_refresh(&self) -> RefreshToken {
        RefreshToken(self.state().epoch)
    }

    /// Replaces server values with a full list fetched since `token`.
    ///
    /// Entities written by a mutation that resolved after `token` keep their
    /// newer value, queued layers stay on top, and a result older than an
    /// already applied refresh is discarded. Returns false when discarded.
    pub fn apply_refresh(&self, token: RefreshToken, items: Vec<(String, T)>) -> bool {
        let events = {
            let mut state = self.state();
            if token.0 < state.last_refresh {
                tracing::debug!(kind = %T::KIND, token = token.0, last = state.last_refresh, "discarding stale refresh");
                return false;
            }
            state.last_refresh = token.0;
            state.epoch += 1;
            let epoch = state.epoch;

            let mut incoming: HashMap<String, T> = items.into_iter().collect();
            let mut changed = Vec::new();

            for (id, entry) in state.entries.iter_mut() {
                let fresh = incoming.remove(id);
                if entry.written_at > token.0 {
                    continue;
                }
                let before = entry.view.clone();
                entry.server = fresh;
                entry.written_at = epoch;
                entry.recompute();
                if entry.view != before {
                    changed.push((id.clone(), entry.view.clone()));
                }
            }
            for (id, value) in incoming {
                let entry = Entry::new(Some(value), epoch);
                changed.push((id.clone(), entry.view.clone()));
                state.entries.insert(id, entry);
            }
            state
                .entries
                .retain(|_, entry| !(entry.is_vacant() && entry.written_at == epoch));

            changed
                .into_iter()
                .map(|(id, view)| self.event(&id, ChangePhase::Refreshed, view))
                .collect::<Vec<_>>()
        };
        tracing::debug!(kind = %T::KIND, changed = events.len(), "refresh applied");
        for event in events {
            self.bus.publish(event);
        }
        true
    }

    /// Drops every entity. Layers still in flight resolve into nothing.
    pub fn clear(&self) {
        let events = {
            let mut state = self.state();
            state.generation += 1;
            state.epoch += 1;
            state.last_refresh = state.epoch;
            let entries = std::mem::take(&mut state.entries);
            entries
                .into_iter()
                .filter(|(_, entry)| entry.view.is_some())
                .map(|(id, _)| self.event(&id, ChangePhase::Cleared, None))
                .collect::<Vec<_>>()
        };
        for event in events {
            self.bus.publish(event);
        }
    }
}

/// Server-derived category list. Replaced wholesale, never patched.
pub struct CategoryCache {
    categories: RwLock<Arc<Vec<BookmarkCategory>>>,
    bus: Arc<SubscriptionBus>,
}

impl CategoryCache {
    pub fn new(bus: Arc<SubscriptionBus>) -> Self {
        Self {
            categories: RwLock::new(Arc::new(Vec::new())),
            bus,
        }
    }

    pub fn snapshot(&self) -> Arc<Vec<BookmarkCategory>> {
        self.categories
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn replace(&self, categories: Vec<BookmarkCategory>) {
        self.publish_replacement(Arc::new(categories), ChangePhase::Refreshed);
    }

    pub fn clear(&self) {
        self.publish_replacement(Arc::new(Vec::new()), ChangePhase::Cleared);
    }

    fn publish_replacement(&self, list: Arc<Vec<BookmarkCategory>>, phase: ChangePhase) {
        let event = {
            let mut guard = self
                .categories
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *guard = list.clone();
            EntityEvent {
                kind: EntityKind::Category,
                id: None,
                phase,
                version: self.bus.next_version(),
                snapshot: EntitySnapshot::Category(list),
            }
        };
        self.bus.publish(event);
    }
}

/// The session-wide store: one instance per signed-in session, injected
/// into every service.
pub struct EntityStore {
    pub bookmarks: Arc<EntityTable<Bookmark>>,
    pub likes: Arc<EntityTable<LikeState>>,
    pub categories: Arc<CategoryCache>,
    bus: Arc<SubscriptionBus>,
}

impl EntityStore {
    pub fn new(bus: Arc<SubscriptionBus>) -> Self {
        Self {
            bookmarks: Arc::new(EntityTable::new(bus.clone())),
            likes: Arc::new(EntityTable::new(bus.clone())),
            categories: Arc::new(CategoryCache::new(bus.clone())),
            bus,
        }
    }

    pub fn bus(&self) -> &Arc<SubscriptionBus> {
        &self.bus
    }

    /// Tears down all cached state (logout).
    pub fn clear(&self) {
        self.bookmarks.clear();
        self.likes.clear();
        self.categories.clear();
        tracing::info!("entity store cleared");
    }
}
