use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the trending list. `popularity_score` comes from the server
/// and is never recomputed locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingEntry {
    #[serde(alias = "id")]
    pub content_id: String,
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub likes_count: u64,
    #[serde(default)]
    pub bookmark_count: u64,
    #[serde(default)]
    pub popularity_score: f64,
}

impl TrendingEntry {
    /// Hours elapsed between `created_at` and `now`, never negative.
    pub fn hours_ago(&self, now: DateTime<Utc>) -> f64 {
        let seconds = (now - self.created_at).num_seconds().max(0);
        seconds as f64 / 3600.0
    }

    /// Relative age label shown next to the entry.
    pub fn age_label(&self, now: DateTime<Utc>) -> String {
        relative_label(self.hours_ago(now))
    }

    /// Rank order: higher score first, then the more recent entry.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .popularity_score
            .total_cmp(&self.popularity_score)
            .then_with(|| other.created_at.cmp(&self.created_at))
    }
}

/// Buckets an age in hours into "방금 전", "N시간 전" or "N일 전".
pub fn relative_label(hours_ago: f64) -> String {
    if hours_ago < 1.0 {
        "방금 전".to_string()
    } else if hours_ago < 24.0 {
        format!("{}시간 전", hours_ago.floor() as u64)
    } else {
        format!("{}일 전", (hours_ago / 24.0).floor() as u64)
    }
}

/// A complete trending list from one refresh cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingSnapshot {
    /// Incremented on every successful refresh; 0 means never loaded.
    pub generation: u64,
    pub fetched_at: Option<DateTime<Utc>>,
    pub entries: Vec<TrendingEntry>,
}

impl TrendingSnapshot {
    pub fn empty() -> Self {
        Self {
            generation: 0,
            fetched_at: None,
            entries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for TrendingSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}
