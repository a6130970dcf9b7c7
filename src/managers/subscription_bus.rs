//! Subscription Bus for promptshelf.
//!
//! Lets any number of UI surfaces (grid card, detail page, side panel) observe
//! the same entity. Every change produced by the entity store, the category
//! cache or the trending ranker is delivered to all observers of that entity
//! and to the observers of its whole kind.
//!
//! Delivery is serialized through a single drain loop: a callback that
//! triggers another change (even synchronously) queues it behind the current
//! event instead of re-entering observers. Each event carries a version
//! allocated while the producer still held its own lock, and a topic never
//! receives a version lower than one it already received.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::types::entity::{EntityEvent, EntityKind};

/// Observer callback. Runs on whichever task published the change.
pub type Callback = Arc<dyn Fn(&EntityEvent) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Topic {
    kind: EntityKind,
    id: Option<String>,
}

#[derive(Default)]
struct BusState {
    next_listener_id: u64,
    listeners: HashMap<Topic, Vec<(u64, Callback)>>,
    delivered: HashMap<Topic, u64>,
    queue: VecDeque<EntityEvent>,
    draining: bool,
}

/// Whether anyone receives events of `topic`, directly or kind-wide.
fn is_observed(listeners: &HashMap<Topic, Vec<(u64, Callback)>>, topic: &Topic) -> bool {
    listeners.contains_key(topic)
        || listeners.contains_key(&Topic {
            kind: topic.kind,
            id: None,
        })
}

impl BusState {
    /// Forgets delivered versions of topics nobody observes any more.
    fn prune_delivered(&mut self) {
        let listeners = &self.listeners;
        self.delivered.retain(|topic, _| is_observed(listeners, topic));
    }
}

/// Fan-out hub for entity change events.
pub struct SubscriptionBus {
    state: Mutex<BusState>,
    version: AtomicU64,
}

impl SubscriptionBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(BusState::default()),
            version: AtomicU64::new(0),
        })
    }

    fn state(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Allocates the next event version. Producers call this while holding
    /// the lock that guards the value being published.
    pub fn next_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Observes a single entity. The returned guard unsubscribes on drop.
    pub fn subscribe<F>(self: &Arc<Self>, kind: EntityKind, id: &str, callback: F) -> Subscription
    where
        F: Fn(&EntityEvent) + Send + Sync + 'static,
    {
        self.add_listener(
            Topic {
                kind,
                id: Some(id.to_string()),
            },
            Arc::new(callback),
        )
    }

    /// Observes every entity of `kind`, including list-wide events.
    pub fn subscribe_kind<F>(self: &Arc<Self>, kind: EntityKind, callback: F) -> Subscription
    where
        F: Fn(&EntityEvent) + Send + Sync + 'static,
    {
        self.add_listener(Topic { kind, id: None }, Arc::new(callback))
    }

    fn add_listener(self: &Arc<Self>, topic: Topic, callback: Callback) -> Subscription {
        let mut state = self.state();
        state.next_listener_id += 1;
        let listener_id = state.next_listener_id;
        state
            .listeners
            .entry(topic.clone())
            .or_default()
            .push((listener_id, callback));
        tracing::trace!(kind = %topic.kind, id = ?topic.id, listener_id, "subscribed");
        Subscription {
            bus: Arc::downgrade(self),
            topic,
            listener_id,
            released: false,
        }
    }

    fn remove_listener(&self, topic: &Topic, listener_id: u64) {
        let mut state = self.state();
        if let Some(listeners) = state.listeners.get_mut(topic) {
            listeners.retain(|(id, _)| *id != listener_id);
            if listeners.is_empty() {
                state.listeners.remove(topic);
                state.prune_delivered();
            }
        }
    }

    /// Number of live subscriptions on one entity (kind-wide ones excluded).
    pub fn listener_count(&self, kind: EntityKind, id: &str) -> usize {
        let topic = Topic {
            kind,
            id: Some(id.to_string()),
        };
        self.state().listeners.get(&topic).map_or(0, Vec::len)
    }

    /// Number of topics whose last delivered version is still tracked.
    pub fn tracked_topics(&self) -> usize {
        self.state().delivered.len()
    }

    /// Total number of live subscriptions.
    pub fn total_listeners(&self) -> usize {
        self.state().listeners.values().map(Vec::len).sum()
    }

    /// Delivers `event` to the observers of its entity and of its kind.
    pub fn publish(&self, event: EntityEvent) {
        {
            let mut state = self.state();
            state.queue.push_back(event);
            if state.draining {
                return;
            }
            state.draining = true;
        }

        let _guard = DrainGuard { bus: self };
        loop {
            let (event, callbacks) = {
                let mut state = self.state();
                let Some(event) = state.queue.pop_front() else {
                    state.draining = false;
                    return;
                };
                let topic = Topic {
                    kind: event.kind,
                    id: event.id.clone(),
                };
                if !is_observed(&state.listeners, &topic) {
                    continue;
                }
                let last = state.delivered.get(&topic).copied().unwrap_or(0);
                if event.version <= last {
                    tracing::trace!(kind = %event.kind, id = ?event.id, version = event.version, last, "dropping stale event");
                    continue;
                }
                state.delivered.insert(topic.clone(), event.version);

                let mut callbacks: Vec<Callback> = state
                    .listeners
                    .get(&topic)
                    .map(|l| l.iter().map(|(_, cb)| cb.clone()).collect())
                    .unwrap_or_default();
                if topic.id.is_some() {
                    let kind_topic = Topic {
                        kind: event.kind,
                        id: None,
                    };
                    if let Some(listeners) = state.listeners.get(&kind_topic) {
                        callbacks.extend(listeners.iter().map(|(_, cb)| cb.clone()));
                    }
                }
                (event, callbacks)
            };

            for callback in callbacks {
                callback(&event);
            }
        }
    }
}

/// Releases the drain flag when an observer panics mid-delivery.
struct DrainGuard<'a> {
    bus: &'a SubscriptionBus,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.bus.state().draining = false;
        }
    }
}

/// Scoped subscription handle; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    bus: Weak<SubscriptionBus>,
    topic: Topic,
    listener_id: u64,
    released: bool,
}

impl Subscription {
    pub fn kind(&self) -> EntityKind {
        self.topic.kind
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.topic.id.as_deref()
    }

    /// Unsubscribes explicitly. Equivalent to dropping the handle.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Some(bus) = self.bus.upgrade() {
            bus.remove_listener(&self.topic, self.listener_id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("listener_id", &self.listener_id)
            .finish()
    }
}
