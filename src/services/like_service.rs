//! Like Service for promptshelf.
//!
//! Toggles likes optimistically. The displayed flag and counter always move
//! together: both live in one `LikeState` value, so a layer, a rollback or a
//! reconciliation replaces the pair as a whole.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::managers::entity_store::EntityStore;
use crate::managers::optimistic_mutator::{rejected, OptimisticMutator, Pending};
use crate::managers::session_manager::AuthGate;
use crate::managers::subscription_bus::Subscription;
use crate::services::api_client::EngagementApi;
use crate::types::entity::{EntityEvent, EntityKind};
use crate::types::errors::EngagementError;
use crate::types::like::LikeState;

const CELEBRATION_CAPACITY: usize = 16;

pub struct LikeService {
    store: Arc<EntityStore>,
    mutator: OptimisticMutator,
    api: Arc<dyn EngagementApi>,
    auth: Arc<dyn AuthGate>,
    celebrations: broadcast::Sender<String>,
}

impl LikeService {
    pub fn new(
        store: Arc<EntityStore>,
        mutator: OptimisticMutator,
        api: Arc<dyn EngagementApi>,
        auth: Arc<dyn AuthGate>,
    ) -> Self {
        let (celebrations, _) = broadcast::channel(CELEBRATION_CAPACITY);
        Self {
            store,
            mutator,
            api,
            auth,
            celebrations,
        }
    }

    /// Like state as currently displayed, `None` if never loaded.
    pub fn like_state(&self, content_id: &str) -> Option<LikeState> {
        self.store.likes.get(content_id)
    }

    /// Records the like state delivered with a content detail. Toggles still
    /// in flight stay applied on top of it.
    pub fn seed(&self, state: LikeState) {
        let id = state.content_id.clone();
        self.store.likes.seed(&id, state);
    }

    pub fn observe<F>(&self, content_id: &str, callback: F) -> Subscription
    where
        F: Fn(&EntityEvent) + Send + Sync + 'static,
    {
        self.store.bus().subscribe(EntityKind::Like, content_id, callback)
    }

    /// Content ids whose like was just confirmed. View-only; lagging or
    /// missing receivers have no effect on like state.
    pub fn celebrations(&self) -> broadcast::Receiver<String> {
        self.celebrations.subscribe()
    }

    /// Flips the like on `content_id`. Resolves to the server's exact pair.
    pub fn toggle(&self, content_id: &str) -> Pending<LikeState> {
        if !self.auth.is_authenticated() {
            return rejected(EngagementError::Unauthenticated);
        }

        let cid = content_id.to_string();
        let api = self.api.clone();
        let pending = self.mutator.apply(
            &self.store.likes,
            content_id,
            move |current| {
                let toggled = match current {
                    Some(state) => state.toggled(),
                    None => LikeState::unknown(cid.clone()).toggled(),
                };
                Some(toggled)
            },
            {
                let cid = content_id.to_string();
                move |_| async move {
                    let state = api.toggle_like(&cid).await?;
                    Ok::<_, EngagementError>(Some(state))
                }
            },
        );

        let celebrations = self.celebrations.clone();
        let cid = content_id.to_string();
        Box::pin(async move {
            let state = pending
                .await?
                .ok_or_else(|| EngagementError::TaskFailed("backend returned no like state".to_string()))?;
            tracing::info!(
                content_id = %cid,
                is_liked = state.is_liked,
                likes_count = state.likes_count,
                "like toggled"
            );
            if state.is_liked {
                // No receivers is the common case outside the UI.
                let _ = celebrations.send(cid);
            }
            Ok(state)
        })
    }
}
