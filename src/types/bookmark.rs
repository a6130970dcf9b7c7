use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display data of a bookmarked prompt.
///
/// The backend embeds it under `prompt`; the UI may also pass one to
/// `BookmarkService::add` so the optimistic bookmark renders fully.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSnapshot {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// A user's bookmark on a single piece of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    pub content_id: String,
    #[serde(default)]
    pub category_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, rename = "prompt")]
    pub content: Option<ContentSnapshot>,
}

impl Bookmark {
    /// Prefix of ids assigned to bookmarks the server has not confirmed yet.
    pub const PENDING_ID_PREFIX: &'static str = "pending-";

    /// Returns true while this bookmark only exists as an optimistic write.
    pub fn is_pending(&self) -> bool {
        self.id.starts_with(Self::PENDING_ID_PREFIX)
    }

    /// The category assignment of this bookmark.
    pub fn assignment(&self) -> CategoryAssignment {
        CategoryAssignment::from(self.category_id.clone())
    }
}

/// A user-defined bookmark category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkCategory {
    pub id: String,
    pub name: String,
    pub color: String,
    /// Recomputed by the server; display only.
    #[serde(default)]
    pub bookmark_count: u64,
}

/// Fields sent when creating or updating a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDraft {
    pub name: String,
    pub color: String,
}

impl CategoryDraft {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
        }
    }
}

/// Where a bookmark is filed. A bookmark belongs to at most one category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "categoryId", rename_all = "camelCase")]
pub enum CategoryAssignment {
    /// Filed under the given category id.
    Single(String),
    /// Uncategorized.
    #[default]
    None,
}

impl CategoryAssignment {
    /// Builds an assignment from a multi-select category picker.
    ///
    /// Only the first selection is persisted. `None` entries mean
    /// "uncategorized"; an empty selection is uncategorized as well.
    pub fn from_selection(selection: &[Option<String>]) -> Self {
        match selection.first() {
            Some(Some(id)) => CategoryAssignment::Single(id.clone()),
            _ => CategoryAssignment::None,
        }
    }

    /// The category id sent to the backend.
    pub fn category_id(&self) -> Option<&str> {
        match self {
            CategoryAssignment::Single(id) => Some(id.as_str()),
            CategoryAssignment::None => None,
        }
    }

    pub fn into_category_id(self) -> Option<String> {
        match self {
            CategoryAssignment::Single(id) => Some(id),
            CategoryAssignment::None => None,
        }
    }
}

impl From<Option<String>> for CategoryAssignment {
    fn from(id: Option<String>) -> Self {
        match id {
            Some(id) => CategoryAssignment::Single(id),
            None => CategoryAssignment::None,
        }
    }
}
