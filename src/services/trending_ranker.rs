//! Trending Ranker for promptshelf.
//!
//! Keeps the server-ranked trending list in its own cache, independent of
//! per-user mutations. Every refresh replaces the whole list at once; a
//! failed refresh keeps the previous list and is only logged.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;

use crate::managers::scheduled_task::ScheduledTask;
use crate::managers::subscription_bus::{Subscription, SubscriptionBus};
use crate::services::api_client::EngagementApi;
use crate::types::entity::{ChangePhase, EntityEvent, EntityKind, EntitySnapshot};
use crate::types::errors::EngagementError;
use crate::types::settings::TrendingSettings;
use crate::types::trending::{TrendingEntry, TrendingSnapshot};

/// Cached top-N trending list with single-flight refresh.
pub struct TrendingRanker {
    api: Arc<dyn EngagementApi>,
    bus: Arc<SubscriptionBus>,
    settings: TrendingSettings,
    snapshot: RwLock<Arc<TrendingSnapshot>>,
    refreshing: AtomicBool,
}

/// Clears the in-flight flag when a refresh ends, however it ends.
struct RefreshSlot<'a>(&'a AtomicBool);

impl Drop for RefreshSlot<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl TrendingRanker {
    pub fn new(api: Arc<dyn EngagementApi>, bus: Arc<SubscriptionBus>, settings: TrendingSettings) -> Self {
        Self {
            api,
            bus,
            settings,
            snapshot: RwLock::new(Arc::new(TrendingSnapshot::empty())),
            refreshing: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &TrendingSettings {
        &self.settings
    }

    /// The current list. Always one whole refresh cycle.
    pub fn snapshot(&self) -> Arc<TrendingSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn entries(&self) -> Vec<TrendingEntry> {
        self.snapshot().entries.clone()
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst)
    }

    pub fn observe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&EntityEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe_kind(EntityKind::Trending, callback)
    }

    /// Fetches the top-N list and swaps it in.
    ///
    /// Never fails: on any error the previous snapshot is kept and returned.
    /// While another refresh is in flight this returns the current snapshot
    /// without issuing a request.
    pub async fn refresh(&self) -> Arc<TrendingSnapshot> {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("trending refresh already in flight, skipping");
            return self.snapshot();
        }
        let _slot = RefreshSlot(&self.refreshing);

        match self.fetch().await {
            Ok(entries) => self.replace(entries),
            Err(err) => {
                let err = EngagementError::PartialRefreshFailure(err.to_string());
                tracing::warn!(error = %err, "trending refresh failed");
                self.snapshot()
            }
        }
    }

    async fn fetch(&self) -> Result<Vec<TrendingEntry>, EngagementError> {
        let timeout = Duration::from_secs(self.settings.refresh_timeout_secs);
        let fetched = tokio::time::timeout(timeout, self.api.trending(self.settings.limit))
            .await
            .map_err(|_| {
                EngagementError::NetworkError(format!("timed out after {}s", timeout.as_secs()))
            })??;
        Ok(rank(fetched, self.settings.limit))
    }

    fn replace(&self, entries: Vec<TrendingEntry>) -> Arc<TrendingSnapshot> {
        let (snapshot, event) = {
            let mut guard = self
                .snapshot
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let snapshot = Arc::new(TrendingSnapshot {
                generation: guard.generation + 1,
                fetched_at: Some(Utc::now()),
                entries,
            });
            *guard = snapshot.clone();
            let event = EntityEvent {
                kind: EntityKind::Trending,
                id: None,
                phase: ChangePhase::Refreshed,
                version: self.bus.next_version(),
                snapshot: EntitySnapshot::Trending(snapshot.clone()),
            };
            (snapshot, event)
        };
        tracing::debug!(generation = snapshot.generation, count = snapshot.len(), "trending list replaced");
        self.bus.publish(event);
        snapshot
    }

    /// Refreshes every `refresh_interval_secs` until the handle is dropped.
    pub fn start_auto_refresh(self: &Arc<Self>) -> ScheduledTask {
        let ranker = Arc::clone(self);
        ScheduledTask::every(
            "trending-refresh",
            Duration::from_secs(self.settings.refresh_interval_secs.max(1)),
            move || {
                let ranker = Arc::clone(&ranker);
                async move {
                    ranker.refresh().await;
                }
            },
        )
    }
}

/// Orders entries by server score (newer first on ties) and keeps the top `limit`.
pub fn rank(mut entries: Vec<TrendingEntry>, limit: usize) -> Vec<TrendingEntry> {
    entries.sort_by(TrendingEntry::rank_cmp);
    entries.truncate(limit);
    entries
}

/// Which trending entry is highlighted. Display state only; it never
/// affects ranking.
#[derive(Default)]
pub struct TrendingRotation {
    index: AtomicUsize,
    hovered: AtomicBool,
}

impl TrendingRotation {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn index(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.hovered.load(Ordering::SeqCst)
    }

    pub fn set_hovered(&self, hovered: bool) {
        self.hovered.store(hovered, Ordering::SeqCst);
    }

    /// Moves to the next entry of a list of `len`, wrapping around.
    /// Does nothing while hovered or when the list is empty.
    pub fn advance(&self, len: usize) -> usize {
        if len == 0 {
            self.index.store(0, Ordering::SeqCst);
            return 0;
        }
        if self.is_paused() {
            return self.index() % len;
        }
        let next = (self.index() + 1) % len;
        self.index.store(next, Ordering::SeqCst);
        next
    }

    /// The highlighted entry of `snapshot`.
    pub fn current(&self, snapshot: &TrendingSnapshot) -> Option<TrendingEntry> {
        if snapshot.is_empty() {
            return None;
        }
        snapshot.entries.get(self.index() % snapshot.len()).cloned()
    }

    /// Advances every `rotation_interval_secs` over the ranker's list.
    pub fn start(self: &Arc<Self>, ranker: Arc<TrendingRanker>) -> ScheduledTask {
        let rotation = Arc::clone(self);
        let period = Duration::from_secs(ranker.settings().rotation_interval_secs.max(1));
        ScheduledTask::every("trending-rotation", period, move || {
            let len = ranker.snapshot().len();
            rotation.advance(len);
            async {}
        })
    }
}
