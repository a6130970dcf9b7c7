use serde::{Deserialize, Serialize};

/// Top-level client settings container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ClientSettings {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub trending: TrendingSettings,
    #[serde(default)]
    pub categories: CategorySettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiSettings {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            request_timeout_secs: 15,
        }
    }
}

/// Trending list refresh and display rotation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendingSettings {
    /// Number of entries kept in the snapshot.
    pub limit: usize,
    pub refresh_interval_secs: u64,
    /// Upper bound on a single refresh; an in-flight refresh suppresses
    /// timer ticks for at most this long.
    pub refresh_timeout_secs: u64,
    pub rotation_interval_secs: u64,
}

impl Default for TrendingSettings {
    fn default() -> Self {
        Self {
            limit: 10,
            refresh_interval_secs: 300,
            refresh_timeout_secs: 30,
            rotation_interval_secs: 3,
        }
    }
}

/// Client-side category validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CategorySettings {
    /// Reject a category whose name (case-insensitive) already exists.
    /// Off by default: the backend is the authority on uniqueness.
    #[serde(default)]
    pub enforce_unique_names: bool,
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSettings {
    /// `EnvFilter` directive, e.g. `info` or `promptshelf=debug`.
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
