use serde::{Deserialize, Serialize};

/// Like status of one piece of content as seen by the current user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeState {
    #[serde(default)]
    pub content_id: String,
    pub is_liked: bool,
    pub likes_count: u64,
}

impl LikeState {
    pub fn new(content_id: impl Into<String>, is_liked: bool, likes_count: u64) -> Self {
        Self {
            content_id: content_id.into(),
            is_liked,
            likes_count,
        }
    }

    /// State assumed for content whose like status was never loaded.
    pub fn unknown(content_id: impl Into<String>) -> Self {
        Self::new(content_id, false, 0)
    }

    /// The state after one toggle: `is_liked` flips and the counter moves
    /// by one in the same direction, never below zero.
    pub fn toggled(&self) -> Self {
        let is_liked = !self.is_liked;
        let likes_count = if is_liked {
            self.likes_count.saturating_add(1)
        } else {
            self.likes_count.saturating_sub(1)
        };
        Self {
            content_id: self.content_id.clone(),
            is_liked,
            likes_count,
        }
    }
}
