use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::bookmark::{Bookmark, BookmarkCategory};
use super::like::LikeState;
use super::trending::TrendingSnapshot;

/// Kinds of entities observed by UI surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Bookmark,
    Like,
    Category,
    Trending,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Bookmark => "bookmark",
            EntityKind::Like => "like",
            EntityKind::Category => "category",
            EntityKind::Trending => "trending",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "bookmark" => Some(EntityKind::Bookmark),
            "like" => Some(EntityKind::Like),
            "category" => Some(EntityKind::Category),
            "trending" => Some(EntityKind::Trending),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an entity changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangePhase {
    /// A local mutation was applied ahead of the server.
    Speculative,
    /// The server answered and its value replaced the speculative one.
    Reconciled,
    /// The request failed and the speculative value was withdrawn.
    RolledBack,
    /// A list refresh or seed replaced the server value.
    Refreshed,
    /// The store was torn down (logout).
    Cleared,
}

/// The fully built value an observer receives.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum EntitySnapshot {
    Bookmark(Option<Bookmark>),
    Like(Option<LikeState>),
    Category(Arc<Vec<BookmarkCategory>>),
    Trending(Arc<TrendingSnapshot>),
}

/// A change notification delivered by the subscription bus.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityEvent {
    pub kind: EntityKind,
    /// Entity id; `None` for list-wide events (categories, trending, clears).
    pub id: Option<String>,
    pub phase: ChangePhase,
    /// Monotonic per producer; observers never receive a lower version
    /// after a higher one for the same topic.
    pub version: u64,
    pub snapshot: EntitySnapshot,
}
