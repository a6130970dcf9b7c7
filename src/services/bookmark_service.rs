//! Bookmark Service for promptshelf.
//!
//! Bookmark creation/removal and category (re)assignment on top of the
//! optimistic mutator. Bookmarks are keyed by content id in the entity store,
//! so `is_bookmarked` is a single map lookup that already reflects in-flight
//! mutations.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::managers::entity_store::EntityStore;
use crate::managers::optimistic_mutator::{rejected, OptimisticMutator, Pending};
use crate::managers::session_manager::AuthGate;
use crate::managers::subscription_bus::Subscription;
use crate::services::api_client::EngagementApi;
use crate::services::invalidation::{sort_newest_first, Invalidator};
use crate::types::bookmark::{Bookmark, CategoryAssignment, ContentSnapshot};
use crate::types::entity::{EntityEvent, EntityKind};
use crate::types::errors::EngagementError;

/// Trait defining bookmark operations exposed to UI surfaces.
pub trait BookmarkServiceTrait {
    fn is_bookmarked(&self, content_id: &str) -> bool;
    fn add(
        &self,
        content_id: &str,
        assignment: CategoryAssignment,
        snapshot: Option<ContentSnapshot>,
    ) -> Pending<Bookmark>;
    fn remove(&self, content_id: &str) -> Pending<()>;
    fn recategorize(&self, bookmark_id: &str, assignment: CategoryAssignment) -> Pending<Bookmark>;
}

/// Bookmark lifecycle backed by the shared entity store.
pub struct BookmarkService {
    store: Arc<EntityStore>,
    mutator: OptimisticMutator,
    api: Arc<dyn EngagementApi>,
    auth: Arc<dyn AuthGate>,
    invalidator: Arc<Invalidator>,
}

impl BookmarkService {
    pub fn new(
        store: Arc<EntityStore>,
        mutator: OptimisticMutator,
        api: Arc<dyn EngagementApi>,
        auth: Arc<dyn AuthGate>,
        invalidator: Arc<Invalidator>,
    ) -> Self {
        Self {
            store,
            mutator,
            api,
            auth,
            invalidator,
        }
    }

    /// The bookmark on `content_id`, speculative or confirmed.
    pub fn bookmark(&self, content_id: &str) -> Option<Bookmark> {
        self.store.bookmarks.get(content_id)
    }

    /// Looks a bookmark up by its bookmark id (not its content id).
    pub fn find_by_id(&self, bookmark_id: &str) -> Option<Bookmark> {
        self.store
            .bookmarks
            .find(|b| b.id == bookmark_id)
            .map(|(_, bookmark)| bookmark)
    }

    /// All bookmarks, newest first.
    pub fn bookmarks(&self) -> Vec<Bookmark> {
        let mut bookmarks = self.store.bookmarks.values();
        sort_newest_first(&mut bookmarks);
        bookmarks
    }

    /// Bookmarks filed under `assignment`, newest first.
    pub fn bookmarks_in(&self, assignment: &CategoryAssignment) -> Vec<Bookmark> {
        let mut bookmarks: Vec<Bookmark> = self
            .store
            .bookmarks
            .values()
            .into_iter()
            .filter(|b| b.category_id.as_deref() == assignment.category_id())
            .collect();
        sort_newest_first(&mut bookmarks);
        bookmarks
    }

    /// Observes the bookmark state of one content item.
    pub fn observe<F>(&self, content_id: &str, callback: F) -> Subscription
    where
        F: Fn(&EntityEvent) + Send + Sync + 'static,
    {
        self.store.bus().subscribe(EntityKind::Bookmark, content_id, callback)
    }

    /// Reloads the bookmark list from the backend.
    pub async fn refresh(&self) -> Result<Vec<Bookmark>, EngagementError> {
        self.invalidator.refresh_bookmarks().await
    }

    /// Files a bookmark from a multi-select picker. Only the first selected
    /// category is persisted; the rest are reported and dropped.
    pub fn recategorize_selection(
        &self,
        bookmark_id: &str,
        selection: &[Option<String>],
    ) -> Pending<Bookmark> {
        if selection.len() > 1 {
            tracing::warn!(
                bookmark_id,
                selected = selection.len(),
                "only the first selected category is persisted"
            );
        }
        self.recategorize(bookmark_id, CategoryAssignment::from_selection(selection))
    }

    /// Moves several bookmarks to one category. Each bookmark resolves
    /// independently; lists are refreshed once at the end if any succeeded.
    ///
    /// Every move is applied before this returns. The refresh runs on a
    /// spawned task, so it happens even if the returned future is dropped.
    pub fn recategorize_many(
        &self,
        bookmark_ids: &[String],
        assignment: CategoryAssignment,
    ) -> impl Future<Output = Vec<Result<Bookmark, EngagementError>>> + Send + 'static {
        let pending: Vec<Pending<Bookmark>> = bookmark_ids
            .iter()
            .map(|id| self.submit_recategorize(id, assignment.clone()))
            .collect();
        let requested = bookmark_ids.len();
        let invalidator = self.invalidator.clone();

        let handle = tokio::spawn(async move {
            let mut results = Vec::with_capacity(pending.len());
            for mutation in pending {
                results.push(mutation.await);
            }
            let moved = results.iter().filter(|r| r.is_ok()).count();
            tracing::info!(requested, moved, "bookmarks moved");
            if moved > 0 {
                invalidator.after_change().await;
            }
            results
        });

        async move {
            match handle.await {
                Ok(results) => results,
                Err(err) => (0..requested)
                    .map(|_| Err(EngagementError::TaskFailed(err.to_string())))
                    .collect(),
            }
        }
    }

    /// Chains the list refresh onto a successful mutation. Both run on a
    /// spawned task that outlives the returned future.
    fn with_invalidation<T: Send + 'static>(&self, pending: Pending<T>) -> Pending<T> {
        let invalidator = self.invalidator.clone();
        let handle = tokio::spawn(async move {
            let value = pending.await?;
            invalidator.after_change().await;
            Ok(value)
        });
        Box::pin(async move {
            match handle.await {
                Ok(result) => result,
                Err(err) => Err(EngagementError::TaskFailed(err.to_string())),
            }
        })
    }

    fn submit_add(
        &self,
        content_id: &str,
        assignment: CategoryAssignment,
        snapshot: Option<ContentSnapshot>,
    ) -> Pending<Bookmark> {
        let Some(user) = self.auth.current_user() else {
            return rejected(EngagementError::Unauthenticated);
        };
        if self.store.bookmarks.contains(content_id) {
            return rejected(EngagementError::AlreadyBookmarked(content_id.to_string()));
        }

        let category_id = assignment.into_category_id();
        let speculative = Bookmark {
            id: format!("{}{}", Bookmark::PENDING_ID_PREFIX, Uuid::new_v4()),
            user_id: user.user_id.clone(),
            content_id: content_id.to_string(),
            category_id: category_id.clone(),
            created_at: Utc::now(),
            content: snapshot.clone(),
        };

        let api = self.api.clone();
        let cid = content_id.to_string();
        let pending = self.mutator.apply(
            &self.store.bookmarks,
            content_id,
            move |_| Some(speculative.clone()),
            move |base| async move {
                if base.is_some() {
                    return Err(EngagementError::AlreadyBookmarked(cid));
                }
                let mut created = api.create_bookmark(&cid, category_id.as_deref()).await?;
                if created.user_id.is_empty() {
                    created.user_id = user.user_id;
                }
                if created.content.is_none() {
                    created.content = snapshot;
                }
                Ok::<_, EngagementError>(Some(created))
            },
        );

        let cid = content_id.to_string();
        Box::pin(async move {
            let created = pending
                .await?
                .ok_or_else(|| EngagementError::TaskFailed("backend returned no bookmark".to_string()))?;
            tracing::info!(content_id = %cid, bookmark_id = %created.id, "bookmark added");
            Ok(created)
        })
    }

    fn submit_remove(&self, content_id: &str) -> Pending<()> {
        if !self.auth.is_authenticated() {
            return rejected(EngagementError::Unauthenticated);
        }
        if !self.store.bookmarks.contains(content_id) {
            return rejected(EngagementError::NotBookmarked(content_id.to_string()));
        }

        let api = self.api.clone();
        let cid = content_id.to_string();
        let pending = self.mutator.apply(
            &self.store.bookmarks,
            content_id,
            |_| None,
            move |base| async move {
                if base.is_none() {
                    return Err(EngagementError::NotBookmarked(cid));
                }
                api.delete_bookmark(&cid).await?;
                Ok::<_, EngagementError>(None)
            },
        );

        let cid = content_id.to_string();
        Box::pin(async move {
            pending.await?;
            tracing::info!(content_id = %cid, "bookmark removed");
            Ok(())
        })
    }

    fn submit_recategorize(&self, bookmark_id: &str, assignment: CategoryAssignment) -> Pending<Bookmark> {
        if !self.auth.is_authenticated() {
            return rejected(EngagementError::Unauthenticated);
        }
        let Some((content_id, _)) = self.store.bookmarks.find(|b| b.id == bookmark_id) else {
            return rejected(EngagementError::BookmarkNotFound(bookmark_id.to_string()));
        };

        let category_id = assignment.into_category_id();
        let speculative_category = category_id.clone();
        let api = self.api.clone();
        let cid = content_id.clone();
        let pending = self.mutator.apply(
            &self.store.bookmarks,
            &content_id,
            move |current| {
                current.map(|bookmark| Bookmark {
                    category_id: speculative_category.clone(),
                    ..bookmark.clone()
                })
            },
            move |base| async move {
                let Some(base) = base else {
                    return Err(EngagementError::NotBookmarked(cid));
                };
                let mut updated = api
                    .update_bookmark_category(&base.id, category_id.as_deref())
                    .await?;
                if updated.user_id.is_empty() {
                    updated.user_id = base.user_id.clone();
                }
                if updated.content.is_none() {
                    updated.content = base.content.clone();
                }
                Ok::<_, EngagementError>(Some(updated))
            },
        );

        Box::pin(async move {
            let updated = pending
                .await?
                .ok_or_else(|| EngagementError::TaskFailed("backend returned no bookmark".to_string()))?;
            tracing::info!(
                content_id = %updated.content_id,
                category_id = ?updated.category_id,
                "bookmark recategorized"
            );
            Ok(updated)
        })
    }
}

impl BookmarkServiceTrait for BookmarkService {
    fn is_bookmarked(&self, content_id: &str) -> bool {
        self.store.bookmarks.contains(content_id)
    }

    /// Bookmarks `content_id`. The bookmark is visible to every surface
    /// before this returns; `snapshot` fills its display data meanwhile.
    fn add(
        &self,
        content_id: &str,
        assignment: CategoryAssignment,
        snapshot: Option<ContentSnapshot>,
    ) -> Pending<Bookmark> {
        let pending = self.submit_add(content_id, assignment, snapshot);
        self.with_invalidation(pending)
    }

    fn remove(&self, content_id: &str) -> Pending<()> {
        let pending = self.submit_remove(content_id);
        self.with_invalidation(pending)
    }

    fn recategorize(&self, bookmark_id: &str, assignment: CategoryAssignment) -> Pending<Bookmark> {
        let pending = self.submit_recategorize(bookmark_id, assignment);
        self.with_invalidation(pending)
    }
}
