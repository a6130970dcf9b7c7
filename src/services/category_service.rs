//! Category Service for promptshelf.
//!
//! Bookmark categories are not optimistic: each change goes to the backend
//! first and the cached list is then fetched again, since bookmark counts
//! are computed server-side.

use std::sync::Arc;

use crate::managers::entity_store::EntityStore;
use crate::managers::session_manager::AuthGate;
use crate::services::api_client::EngagementApi;
use crate::services::invalidation::Invalidator;
use crate::types::bookmark::{BookmarkCategory, CategoryDraft};
use crate::types::errors::EngagementError;
use crate::types::settings::CategorySettings;

const MAX_NAME_LEN: usize = 50;

/// Category CRUD backed by the cached category list.
pub struct CategoryService {
    store: Arc<EntityStore>,
    api: Arc<dyn EngagementApi>,
    auth: Arc<dyn AuthGate>,
    invalidator: Arc<Invalidator>,
    settings: CategorySettings,
}

impl CategoryService {
    pub fn new(
        store: Arc<EntityStore>,
        api: Arc<dyn EngagementApi>,
        auth: Arc<dyn AuthGate>,
        invalidator: Arc<Invalidator>,
        settings: CategorySettings,
    ) -> Self {
        Self {
            store,
            api,
            auth,
            invalidator,
            settings,
        }
    }

    pub fn categories(&self) -> Arc<Vec<BookmarkCategory>> {
        self.store.categories.snapshot()
    }

    pub fn category(&self, id: &str) -> Option<BookmarkCategory> {
        self.categories().iter().find(|c| c.id == id).cloned()
    }

    pub async fn refresh(&self) -> Result<Arc<Vec<BookmarkCategory>>, EngagementError> {
        self.invalidator.refresh_categories().await
    }

    pub async fn create(&self, draft: CategoryDraft) -> Result<BookmarkCategory, EngagementError> {
        self.ensure_authenticated()?;
        let draft = self.validate(draft, None)?;
        let created = self.api.create_category(&draft).await?;
        tracing::info!(category_id = %created.id, name = %created.name, "category created");
        self.refresh_after_change().await;
        Ok(created)
    }

    pub async fn update(
        &self,
        id: &str,
        draft: CategoryDraft,
    ) -> Result<BookmarkCategory, EngagementError> {
        self.ensure_authenticated()?;
        let draft = self.validate(draft, Some(id))?;
        let updated = self.api.update_category(id, &draft).await?;
        tracing::info!(category_id = %id, name = %updated.name, "category updated");
        self.refresh_after_change().await;
        Ok(updated)
    }

    /// Deletes a category. The backend moves its bookmarks to
    /// uncategorized, so the bookmark list is fetched again as well.
    pub async fn delete(&self, id: &str) -> Result<(), EngagementError> {
        self.ensure_authenticated()?;
        self.api.delete_category(id).await?;
        tracing::info!(category_id = %id, "category deleted");
        self.invalidator.after_change().await;
        Ok(())
    }

    fn ensure_authenticated(&self) -> Result<(), EngagementError> {
        if self.auth.is_authenticated() {
            Ok(())
        } else {
            Err(EngagementError::Unauthenticated)
        }
    }

    async fn refresh_after_change(&self) {
        if let Err(err) = self.invalidator.refresh_categories().await {
            tracing::warn!(error = %err, "category refresh after change failed");
        }
    }

    /// Normalizes and checks a draft. `editing` is the id of the category
    /// being updated, which may keep its own name.
    fn validate(
        &self,
        draft: CategoryDraft,
        editing: Option<&str>,
    ) -> Result<CategoryDraft, EngagementError> {
        let name = draft.name.trim().to_string();
        if name.is_empty() {
            return Err(EngagementError::InvalidCategory("name must not be empty".to_string()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(EngagementError::InvalidCategory(format!(
                "name is longer than {} characters",
                MAX_NAME_LEN
            )));
        }

        let color = draft.color.trim().to_ascii_lowercase();
        if !is_color_token(&color) {
            return Err(EngagementError::InvalidCategory(format!(
                "color must be #rgb or #rrggbb, got {:?}",
                draft.color
            )));
        }

        if self.settings.enforce_unique_names {
            let taken = self.categories().iter().any(|c| {
                Some(c.id.as_str()) != editing && c.name.trim().to_lowercase() == name.to_lowercase()
            });
            if taken {
                return Err(EngagementError::DuplicateCategoryName(name));
            }
        }

        Ok(CategoryDraft { name, color })
    }
}

/// `#rgb` or `#rrggbb` hex color.
pub fn is_color_token(color: &str) -> bool {
    match color.strip_prefix('#') {
        Some(hex) => (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}
