//! RPC method handler for the promptshelf JSON-RPC protocol.
//!
//! Extracted from `rpc_server.rs` so it can be unit-tested independently.
//! `start_method` applies a call to the services of the `App` and returns
//! the part that waits on the backend; `handle_method` awaits both. Entity
//! subscriptions opened over RPC push their events through the context's
//! event channel.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::app::App;
use crate::managers::subscription_bus::Subscription;
use crate::services::bookmark_service::BookmarkServiceTrait;
use crate::types::bookmark::{CategoryAssignment, CategoryDraft, ContentSnapshot};
use crate::types::entity::{EntityEvent, EntityKind};
use crate::types::errors::EngagementError;
use crate::types::like::LikeState;
use crate::types::session::UserIdentity;
use crate::types::trending::TrendingSnapshot;

/// Per-connection state: the app plus the subscriptions opened by the peer.
pub struct RpcContext {
    pub app: Arc<App>,
    events: mpsc::UnboundedSender<Value>,
    subscriptions: Mutex<HashMap<u64, Subscription>>,
    next_subscription: AtomicU64,
}

impl RpcContext {
    pub fn new(app: Arc<App>, events: mpsc::UnboundedSender<Value>) -> Self {
        Self {
            app,
            events,
            subscriptions: Mutex::new(HashMap::new()),
            next_subscription: AtomicU64::new(0),
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .len()
    }

    fn subscribe(&self, kind: EntityKind, id: Option<&str>) -> u64 {
        let handle = self.next_subscription.fetch_add(1, Ordering::SeqCst) + 1;
        let events = self.events.clone();
        let forward = move |event: &EntityEvent| {
            let payload = json!({"event": "entity.changed", "subscription": handle, "data": event});
            // The receiver is gone only when the connection is closing.
            let _ = events.send(payload);
        };
        let subscription = match id {
            Some(id) => self.app.bus.subscribe(kind, id, forward),
            None => self.app.bus.subscribe_kind(kind, forward),
        };
        self.subscriptions
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(handle, subscription);
        handle
    }

    fn unsubscribe(&self, handle: u64) -> bool {
        let removed = self
            .subscriptions
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&handle);
        removed.is_some()
    }
}

fn str_param<'a>(params: &'a Value, key: &str) -> Result<&'a str, String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("missing {}", key))
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| e.to_string())
}

/// `categoryId` as an assignment: a string files the bookmark, `null` or a
/// missing key leaves it uncategorized.
fn assignment_param(params: &Value) -> CategoryAssignment {
    CategoryAssignment::from(
        params
            .get("categoryId")
            .and_then(|v| v.as_str())
            .map(str::to_string),
    )
}

fn draft_param(params: &Value) -> Result<CategoryDraft, String> {
    Ok(CategoryDraft::new(
        str_param(params, "name")?,
        str_param(params, "color")?,
    ))
}

/// The deferred part of an RPC call.
pub type Reply = Pin<Box<dyn Future<Output = Result<Value, String>> + Send>>;

fn ready(result: Result<Value, String>) -> Reply {
    Box::pin(std::future::ready(result))
}

fn reply<T, F>(future: F) -> Reply
where
    T: Serialize,
    F: Future<Output = Result<T, EngagementError>> + Send + 'static,
{
    Box::pin(async move {
        let value = future.await.map_err(|e| e.to_string())?;
        to_json(&value)
    })
}

/// Dispatch an RPC method call and wait for its result.
///
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
pub async fn handle_method(ctx: &RpcContext, method: &str, params: &Value) -> Result<Value, String> {
    start_method(ctx, method, params).await
}

/// Starts an RPC method call.
///
/// Everything that touches local state (session changes, optimistic
/// writes, reads, subscriptions) happens before this returns, so calls
/// started in line order take effect in line order. The returned future
/// only waits for the backend.
pub fn start_method(ctx: &RpcContext, method: &str, params: &Value) -> Reply {
    match dispatch(ctx, method, params) {
        Ok(reply) => reply,
        Err(err) => ready(Err(err)),
    }
}

fn dispatch(ctx: &RpcContext, method: &str, params: &Value) -> Result<Reply, String> {
    let app = &ctx.app;
    let reply: Reply = match method {
        // ─── Session ───
        "session.login" => {
            let mut user = UserIdentity::new(str_param(params, "userId")?);
            user.display_name = params.get("displayName").and_then(|v| v.as_str()).map(str::to_string);
            if let Some(token) = params.get("accessToken").and_then(|v| v.as_str()) {
                user = user.with_token(token);
            }
            let loading = app.login(user);
            Box::pin(async move {
                loading.await.map_err(|e| e.to_string())?;
                Ok::<_, String>(json!({"ok": true}))
            })
        }
        "session.logout" => {
            let previous = app.logout();
            ready(Ok(json!({"ok": true, "userId": previous.map(|u| u.user_id)})))
        }

        // ─── Bookmarks ───
        "bookmark.isBookmarked" => {
            let content_id = str_param(params, "contentId")?;
            ready(Ok(json!({"bookmarked": app.bookmarks.is_bookmarked(content_id)})))
        }
        "bookmark.list" => {
            let bookmarks = if params.get("categoryId").is_some() {
                app.bookmarks.bookmarks_in(&assignment_param(params))
            } else {
                app.bookmarks.bookmarks()
            };
            ready(to_json(&bookmarks))
        }
        "bookmark.add" => {
            let content_id = str_param(params, "contentId")?;
            let snapshot = match params.get("content") {
                Some(Value::Null) | None => None,
                Some(v) => Some(
                    serde_json::from_value::<ContentSnapshot>(v.clone())
                        .map_err(|e| format!("invalid content: {}", e))?,
                ),
            };
            reply(app.bookmarks.add(content_id, assignment_param(params), snapshot))
        }
        "bookmark.remove" => {
            let content_id = str_param(params, "contentId")?;
            let removal = app.bookmarks.remove(content_id);
            Box::pin(async move {
                removal.await.map_err(|e| e.to_string())?;
                Ok::<_, String>(json!({"ok": true}))
            })
        }
        "bookmark.recategorize" => {
            let bookmark_id = str_param(params, "bookmarkId")?;
            match params.get("categoryIds").and_then(|v| v.as_array()) {
                Some(ids) => {
                    let selection: Vec<Option<String>> = ids
                        .iter()
                        .map(|v| v.as_str().map(str::to_string))
                        .collect();
                    reply(app.bookmarks.recategorize_selection(bookmark_id, &selection))
                }
                None => reply(app.bookmarks.recategorize(bookmark_id, assignment_param(params))),
            }
        }
        "bookmark.moveMany" => {
            let ids: Vec<String> = params
                .get("bookmarkIds")
                .and_then(|v| v.as_array())
                .ok_or("missing bookmarkIds")?
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
            let moving = app.bookmarks.recategorize_many(&ids, assignment_param(params));
            Box::pin(async move {
                let results = moving.await;
                let arr: Vec<Value> = ids
                    .iter()
                    .zip(results)
                    .map(|(id, result)| match result {
                        Ok(bookmark) => json!({"bookmarkId": id, "ok": true, "categoryId": bookmark.category_id}),
                        Err(err) => json!({"bookmarkId": id, "ok": false, "error": err.to_string()}),
                    })
                    .collect();
                Ok::<_, String>(json!(arr))
            })
        }
        "bookmark.refresh" => {
            let app = app.clone();
            Box::pin(async move {
                let bookmarks = app.bookmarks.refresh().await.map_err(|e| e.to_string())?;
                to_json(&bookmarks)
            })
        }

        // ─── Categories ───
        "category.list" => ready(to_json(app.categories.categories().as_ref())),
        "category.create" => {
            let draft = draft_param(params)?;
            let app = app.clone();
            Box::pin(async move {
                let created = app.categories.create(draft).await.map_err(|e| e.to_string())?;
                to_json(&created)
            })
        }
        "category.update" => {
            let id = str_param(params, "id")?.to_string();
            let draft = draft_param(params)?;
            let app = app.clone();
            Box::pin(async move {
                let updated = app.categories.update(&id, draft).await.map_err(|e| e.to_string())?;
                to_json(&updated)
            })
        }
        "category.delete" => {
            let id = str_param(params, "id")?.to_string();
            let app = app.clone();
            Box::pin(async move {
                app.categories.delete(&id).await.map_err(|e| e.to_string())?;
                Ok::<_, String>(json!({"ok": true}))
            })
        }

        // ─── Likes ───
        "like.get" => {
            let content_id = str_param(params, "contentId")?;
            ready(to_json(&app.likes.like_state(content_id)))
        }
        "like.seed" => {
            let content_id = str_param(params, "contentId")?;
            let is_liked = params.get("isLiked").and_then(|v| v.as_bool()).ok_or("missing isLiked")?;
            let likes_count = params
                .get("likesCount")
                .and_then(|v| v.as_u64())
                .ok_or("missing likesCount")?;
            app.likes.seed(LikeState::new(content_id, is_liked, likes_count));
            ready(Ok(json!({"ok": true})))
        }
        "like.toggle" => {
            let content_id = str_param(params, "contentId")?;
            reply(app.likes.toggle(content_id))
        }

        // ─── Trending ───
        "trending.list" => ready(Ok(trending_json(app.trending.snapshot().as_ref()))),
        "trending.refresh" => {
            let ranker = app.trending.clone();
            Box::pin(async move { Ok::<_, String>(trending_json(ranker.refresh().await.as_ref())) })
        }

        // ─── Subscriptions ───
        "subscribe" => {
            let kind_name = str_param(params, "kind")?;
            let kind = EntityKind::parse(kind_name).ok_or_else(|| format!("unknown kind: {}", kind_name))?;
            let id = params.get("id").and_then(|v| v.as_str());
            let handle = ctx.subscribe(kind, id);
            ready(Ok(json!({"subscription": handle})))
        }
        "unsubscribe" => {
            let handle = params
                .get("subscription")
                .and_then(|v| v.as_u64())
                .ok_or("missing subscription")?;
            ready(Ok(json!({"ok": ctx.unsubscribe(handle)})))
        }

        // ─── Ping ───
        "ping" => ready(Ok(json!({"pong": true}))),

        _ => return Err(format!("unknown method: {}", method)),
    };
    Ok(reply)
}

/// Trending snapshot with the relative age label of each entry.
fn trending_json(snapshot: &TrendingSnapshot) -> Value {
    let now = Utc::now();
    let entries: Vec<Value> = snapshot
        .entries
        .iter()
        .map(|entry| {
            let mut value = serde_json::to_value(entry).unwrap_or(Value::Null);
            if let Value::Object(map) = &mut value {
                map.insert("ageLabel".to_string(), json!(entry.age_label(now)));
            }
            value
        })
        .collect();
    json!({
        "generation": snapshot.generation,
        "fetchedAt": snapshot.fetched_at,
        "entries": entries,
    })
}
