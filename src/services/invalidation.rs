//! List refreshes triggered after engagement changes.
//!
//! Bookmark counts on categories and the bookmark lists shown in the panel,
//! grid and detail page are derived data; after any successful bookmark or
//! category change both lists are fetched again.

use std::sync::Arc;

use crate::managers::entity_store::EntityStore;
use crate::managers::session_manager::AuthGate;
use crate::services::api_client::EngagementApi;
use crate::types::bookmark::{Bookmark, BookmarkCategory};
use crate::types::errors::EngagementError;

/// Fetches the bookmark and category lists into the store.
pub struct Invalidator {
    store: Arc<EntityStore>,
    api: Arc<dyn EngagementApi>,
    auth: Arc<dyn AuthGate>,
}

impl Invalidator {
    pub fn new(store: Arc<EntityStore>, api: Arc<dyn EngagementApi>, auth: Arc<dyn AuthGate>) -> Self {
        Self { store, api, auth }
    }

    /// `GET /bookmarks` into the bookmark table. Returns the resulting list,
    /// newest first, including bookmarks still in their optimistic window.
    pub async fn refresh_bookmarks(&self) -> Result<Vec<Bookmark>, EngagementError> {
        let user = self.auth.current_user().ok_or(EngagementError::Unauthenticated)?;
        let token = self.store.bookmarks.begin_refresh();
        let listed = self.api.list_bookmarks().await?;

        let items = listed
            .into_iter()
            .map(|mut bookmark| {
                if bookmark.user_id.is_empty() {
                    bookmark.user_id = user.user_id.clone();
                }
                (bookmark.content_id.clone(), bookmark)
            })
            .collect::<Vec<_>>();
        let count = items.len();
        if self.store.bookmarks.apply_refresh(token, items) {
            tracing::debug!(count, "bookmark list refreshed");
        }

        let mut bookmarks = self.store.bookmarks.values();
        sort_newest_first(&mut bookmarks);
        Ok(bookmarks)
    }

    /// `GET /bookmark-categories` into the category cache.
    pub async fn refresh_categories(&self) -> Result<Arc<Vec<BookmarkCategory>>, EngagementError> {
        if !self.auth.is_authenticated() {
            return Err(EngagementError::Unauthenticated);
        }
        let categories = self.api.list_categories().await?;
        tracing::debug!(count = categories.len(), "category list refreshed");
        self.store.categories.replace(categories);
        Ok(self.store.categories.snapshot())
    }

    /// Refreshes both lists after a successful change. Failures are logged;
    /// the change itself already succeeded.
    pub async fn after_change(&self) {
        let (categories, bookmarks) = tokio::join!(self.refresh_categories(), self.refresh_bookmarks());
        if let Err(err) = categories {
            tracing::warn!(error = %err, "category refresh after change failed");
        }
        if let Err(err) = bookmarks {
            tracing::warn!(error = %err, "bookmark refresh after change failed");
        }
    }
}

/// Sorts bookmarks by `created_at`, most recent first.
pub fn sort_newest_first(bookmarks: &mut [Bookmark]) {
    bookmarks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}
