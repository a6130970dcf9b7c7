use thiserror::Error;

// === ApiError ===

/// Errors returned by the backend transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response (offline, DNS, reset).
    #[error("Network request failed: {0}")]
    Network(String),
    /// The backend rejected the session (HTTP 401).
    #[error("Backend rejected the session")]
    Unauthorized,
    /// Any other non-success status.
    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },
    /// The response body did not match the expected shape.
    #[error("Failed to decode backend response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            if status == reqwest::StatusCode::UNAUTHORIZED {
                ApiError::Unauthorized
            } else {
                ApiError::Status {
                    status: status.as_u16(),
                    message: err.to_string(),
                }
            }
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

// === EngagementError ===

/// Errors surfaced by the bookmark, category, like and trending services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngagementError {
    /// No active session; the caller must redirect to login.
    #[error("Login required")]
    Unauthenticated,
    /// A bookmark for this content already exists locally.
    #[error("Content already bookmarked: {0}")]
    AlreadyBookmarked(String),
    /// No local bookmark exists for this content.
    #[error("Content not bookmarked: {0}")]
    NotBookmarked(String),
    /// No local bookmark carries this bookmark id.
    #[error("Bookmark not found: {0}")]
    BookmarkNotFound(String),
    /// The request failed in transit after the optimistic write.
    #[error("Network error: {0}")]
    NetworkError(String),
    /// The backend answered with an error.
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },
    /// A read-only refresh failed; stale data was retained.
    #[error("Refresh failed, keeping previous data: {0}")]
    PartialRefreshFailure(String),
    /// A category draft failed validation.
    #[error("Invalid category: {0}")]
    InvalidCategory(String),
    /// A category with the same name exists and uniqueness is enforced.
    #[error("Category name already in use: {0}")]
    DuplicateCategoryName(String),
    /// The background task driving a mutation did not finish.
    #[error("Mutation task failed: {0}")]
    TaskFailed(String),
}

impl EngagementError {
    /// Whether the UI should redirect to the login screen.
    pub fn requires_login(&self) -> bool {
        matches!(self, EngagementError::Unauthenticated)
    }

    /// Whether the error is shown to the user (toast or inline message).
    ///
    /// Trending refresh failures are intentionally silent.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, EngagementError::PartialRefreshFailure(_))
    }

    /// Whether the user may retry the same action by hand.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngagementError::NetworkError(_)
                | EngagementError::ServerError { .. }
                | EngagementError::TaskFailed(_)
        )
    }
}

impl From<ApiError> for EngagementError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Network(msg) => EngagementError::NetworkError(msg),
            ApiError::Unauthorized => EngagementError::Unauthenticated,
            ApiError::Status { status, message } => EngagementError::ServerError { status, message },
            ApiError::Decode(msg) => EngagementError::ServerError {
                status: 200,
                message: msg,
            },
        }
    }
}

// === SettingsError ===

/// Errors related to client settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// File system error reading or writing the config file.
    #[error("Settings I/O error: {0}")]
    IoError(String),
    /// JSON serialization or parsing failed.
    #[error("Settings serialization error: {0}")]
    SerializationError(String),
    /// The dot-notation key does not exist.
    #[error("Invalid settings key: {0}")]
    InvalidKey(String),
    /// The new value has the wrong type or range.
    #[error("Invalid settings value: {0}")]
    InvalidValue(String),
}
