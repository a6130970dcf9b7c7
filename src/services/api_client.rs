//! Backend API client for promptshelf.
//!
//! `EngagementApi` is the seam between the engagement layer and the remote
//! REST backend. `HttpEngagementApi` implements it over reqwest; tests plug
//! in an in-memory implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::managers::session_manager::AuthGate;
use crate::types::bookmark::{Bookmark, BookmarkCategory, CategoryDraft, ContentSnapshot};
use crate::types::errors::ApiError;
use crate::types::like::LikeState;
use crate::types::trending::TrendingEntry;

/// Operations the engagement layer consumes from the backend.
#[async_trait]
pub trait EngagementApi: Send + Sync {
    async fn list_bookmarks(&self) -> Result<Vec<Bookmark>, ApiError>;
    async fn create_bookmark(
        &self,
        content_id: &str,
        category_id: Option<&str>,
    ) -> Result<Bookmark, ApiError>;
    async fn update_bookmark_category(
        &self,
        bookmark_id: &str,
        category_id: Option<&str>,
    ) -> Result<Bookmark, ApiError>;
    async fn delete_bookmark(&self, content_id: &str) -> Result<(), ApiError>;

    async fn list_categories(&self) -> Result<Vec<BookmarkCategory>, ApiError>;
    async fn create_category(&self, draft: &CategoryDraft) -> Result<BookmarkCategory, ApiError>;
    async fn update_category(
        &self,
        id: &str,
        draft: &CategoryDraft,
    ) -> Result<BookmarkCategory, ApiError>;
    async fn delete_category(&self, id: &str) -> Result<(), ApiError>;

    async fn toggle_like(&self, content_id: &str) -> Result<LikeState, ApiError>;

    async fn trending(&self, limit: usize) -> Result<Vec<TrendingEntry>, ApiError>;
}

/// Bookmark as the backend serializes it. `GET /bookmarks` only embeds the
/// prompt, so the content id falls back to `prompt.id`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkRecord {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub content_id: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub prompt: Option<ContentSnapshot>,
}

impl BookmarkRecord {
    pub fn into_bookmark(self) -> Result<Bookmark, ApiError> {
        let content_id = self
            .content_id
            .or_else(|| self.prompt.as_ref().map(|p| p.id.clone()))
            .ok_or_else(|| ApiError::Decode(format!("bookmark {} has no content id", self.id)))?;
        Ok(Bookmark {
            id: self.id,
            user_id: self.user_id.unwrap_or_default(),
            content_id,
            category_id: self.category_id,
            created_at: self.created_at,
            content: self.prompt,
        })
    }
}

/// `{success, data}` envelope used by the prompts endpoints.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    pub fn into_result(self) -> Result<T, ApiError> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (_, _) => Err(ApiError::Status {
                status: StatusCode::OK.as_u16(),
                message: self
                    .message
                    .unwrap_or_else(|| "request reported success=false".to_string()),
            }),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateBookmarkBody<'a> {
    content_id: &'a str,
    category_id: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CategoryBody<'a> {
    category_id: Option<&'a str>,
}

/// reqwest-backed implementation of [`EngagementApi`].
pub struct HttpEngagementApi {
    client: Client,
    base_url: String,
    auth: Arc<dyn AuthGate>,
}

impl HttpEngagementApi {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        auth: Arc<dyn AuthGate>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("promptshelf/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
        })
    }

    /// Absolute URL for an API path such as `/bookmarks`.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match self.auth.access_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        let message = response.text().await.unwrap_or_default();
        tracing::debug!(status = status.as_u16(), body = %message, "backend returned an error");
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl EngagementApi for HttpEngagementApi {
    async fn list_bookmarks(&self) -> Result<Vec<Bookmark>, ApiError> {
        let records: Vec<BookmarkRecord> = self.json(self.request(Method::GET, "/bookmarks")).await?;
        records.into_iter().map(BookmarkRecord::into_bookmark).collect()
    }

    async fn create_bookmark(
        &self,
        content_id: &str,
        category_id: Option<&str>,
    ) -> Result<Bookmark, ApiError> {
        let body = CreateBookmarkBody {
            content_id,
            category_id,
        };
        let record: BookmarkRecord = self
            .json(self.request(Method::POST, "/bookmarks").json(&body))
            .await?;
        record.into_bookmark()
    }

    async fn update_bookmark_category(
        &self,
        bookmark_id: &str,
        category_id: Option<&str>,
    ) -> Result<Bookmark, ApiError> {
        let record: BookmarkRecord = self
            .json(
                self.request(Method::PATCH, &format!("/bookmarks/{}", bookmark_id))
                    .json(&CategoryBody { category_id }),
            )
            .await?;
        record.into_bookmark()
    }

    async fn delete_bookmark(&self, content_id: &str) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, &format!("/bookmarks/{}", content_id)))
            .await?;
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<BookmarkCategory>, ApiError> {
        self.json(self.request(Method::GET, "/bookmark-categories")).await
    }

    async fn create_category(&self, draft: &CategoryDraft) -> Result<BookmarkCategory, ApiError> {
        self.json(self.request(Method::POST, "/bookmark-categories").json(draft))
            .await
    }

    async fn update_category(
        &self,
        id: &str,
        draft: &CategoryDraft,
    ) -> Result<BookmarkCategory, ApiError> {
        self.json(
            self.request(Method::PUT, &format!("/bookmark-categories/{}", id))
                .json(draft),
        )
        .await
    }

    async fn delete_category(&self, id: &str) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, &format!("/bookmark-categories/{}", id)))
            .await?;
        Ok(())
    }

    async fn toggle_like(&self, content_id: &str) -> Result<LikeState, ApiError> {
        let mut state: LikeState = self
            .json(self.request(Method::POST, &format!("/likes/{}/toggle", content_id)))
            .await?;
        state.content_id = content_id.to_string();
        Ok(state)
    }

    async fn trending(&self, limit: usize) -> Result<Vec<TrendingEntry>, ApiError> {
        let envelope: Envelope<Vec<TrendingEntry>> = self
            .json(
                self.request(Method::GET, "/prompts/trending")
                    .query(&[("limit", limit)]),
            )
            .await?;
        envelope.into_result()
    }
}
