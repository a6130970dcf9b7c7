//! Unit tests for the RPC handler: JSON-RPC methods dispatched by `handle_method`.
//!
//! These run every method through the same code path as the
//! `promptshelf-rpc` binary, over the in-memory backend.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use common::{app_over, at, trending_entry, MockApi};
use promptshelf::rpc_handler::{handle_method, start_method, RpcContext};
use promptshelf::types::like::LikeState;

/// Fresh context over `api`, plus the receiver for pushed events.
fn setup(api: &Arc<MockApi>) -> (RpcContext, mpsc::UnboundedReceiver<Value>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RpcContext::new(Arc::new(app_over(api)), tx), rx)
}

async fn login(ctx: &RpcContext) {
    let res = handle_method(
        ctx,
        "session.login",
        &json!({"userId": "u-1", "displayName": "Jun", "accessToken": "token-1"}),
    )
    .await
    .unwrap();
    assert_eq!(res, json!({"ok": true}));
}

// ─── Ping ───

#[tokio::test]
async fn test_ping() {
    let api = MockApi::new();
    let (ctx, _rx) = setup(&api);
    let res = handle_method(&ctx, "ping", &json!({})).await.unwrap();
    assert_eq!(res, json!({"pong": true}));
}

// ─── Unknown method ───

#[tokio::test]
async fn test_unknown_method_returns_error() {
    let api = MockApi::new();
    let (ctx, _rx) = setup(&api);
    let res = handle_method(&ctx, "nonexistent.method", &json!({})).await;
    assert!(res.unwrap_err().contains("unknown method"));
}

// ─── Session ───

#[tokio::test]
async fn test_login_loads_lists_and_logout_clears_them() {
    let api = MockApi::new();
    api.put_bookmark("42", None);
    let (ctx, _rx) = setup(&api);

    login(&ctx).await;
    let list = handle_method(&ctx, "bookmark.list", &json!({})).await.unwrap();
    assert_eq!(list.as_array().unwrap().len(), 1);

    let res = handle_method(&ctx, "session.logout", &json!({})).await.unwrap();
    assert_eq!(res["userId"], "u-1");
    let list = handle_method(&ctx, "bookmark.list", &json!({})).await.unwrap();
    assert!(list.as_array().unwrap().is_empty());
}

// ─── Bookmarks ───

#[tokio::test]
async fn test_bookmark_add_and_query() {
    let api = MockApi::new();
    let (ctx, _rx) = setup(&api);
    login(&ctx).await;

    let res = handle_method(
        &ctx,
        "bookmark.add",
        &json!({
            "contentId": "42",
            "categoryId": null,
            "content": {"id": "42", "title": "Prompt 42"}
        }),
    )
    .await
    .unwrap();
    assert_eq!(res["contentId"], "42");
    assert_eq!(res["prompt"]["title"], "Prompt 42");

    let res = handle_method(&ctx, "bookmark.isBookmarked", &json!({"contentId": "42"}))
        .await
        .unwrap();
    assert_eq!(res, json!({"bookmarked": true}));

    let uncategorized = handle_method(&ctx, "bookmark.list", &json!({"categoryId": null}))
        .await
        .unwrap();
    assert_eq!(uncategorized.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_bookmark_add_requires_login() {
    let api = MockApi::new();
    let (ctx, _rx) = setup(&api);

    let err = handle_method(&ctx, "bookmark.add", &json!({"contentId": "42"}))
        .await
        .unwrap_err();

    assert!(err.to_lowercase().contains("log"));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_bookmark_recategorize_and_move_many() {
    let api = MockApi::new();
    let first = api.put_bookmark("1", None);
    let second = api.put_bookmark("2", None);
    let (ctx, _rx) = setup(&api);
    login(&ctx).await;

    let res = handle_method(
        &ctx,
        "bookmark.recategorize",
        &json!({"bookmarkId": first.id, "categoryIds": ["cat-a", "cat-b"]}),
    )
    .await
    .unwrap();
    assert_eq!(res["categoryId"], "cat-a");

    let res = handle_method(
        &ctx,
        "bookmark.moveMany",
        &json!({"bookmarkIds": [first.id, second.id, "bm-x"], "categoryId": "cat-c"}),
    )
    .await
    .unwrap();
    let arr = res.as_array().unwrap();
    assert_eq!(arr.len(), 3);
    assert_eq!(arr[0]["ok"], true);
    assert_eq!(arr[1]["categoryId"], "cat-c");
    assert_eq!(arr[2]["ok"], false);
}

#[tokio::test]
async fn test_bookmark_remove() {
    let api = MockApi::new();
    api.put_bookmark("42", None);
    let (ctx, _rx) = setup(&api);
    login(&ctx).await;

    let res = handle_method(&ctx, "bookmark.remove", &json!({"contentId": "42"}))
        .await
        .unwrap();
    assert_eq!(res, json!({"ok": true}));
    assert!(api.server_bookmarks().is_empty());
}

#[tokio::test]
async fn test_missing_params_are_reported() {
    let api = MockApi::new();
    let (ctx, _rx) = setup(&api);
    login(&ctx).await;

    let err = handle_method(&ctx, "bookmark.remove", &json!({})).await.unwrap_err();
    assert_eq!(err, "missing contentId");
    let err = handle_method(&ctx, "bookmark.moveMany", &json!({})).await.unwrap_err();
    assert_eq!(err, "missing bookmarkIds");
    let err = handle_method(&ctx, "like.seed", &json!({"contentId": "7"}))
        .await
        .unwrap_err();
    assert_eq!(err, "missing isLiked");
}

// ─── Categories ───

#[tokio::test]
async fn test_category_lifecycle() {
    let api = MockApi::new();
    let (ctx, _rx) = setup(&api);
    login(&ctx).await;

    let created = handle_method(
        &ctx,
        "category.create",
        &json!({"name": "Writing", "color": "#ABCDEF"}),
    )
    .await
    .unwrap();
    assert_eq!(created["color"], "#abcdef");
    let id = created["id"].as_str().unwrap().to_string();

    let updated = handle_method(
        &ctx,
        "category.update",
        &json!({"id": id, "name": "Drafts", "color": "#fff"}),
    )
    .await
    .unwrap();
    assert_eq!(updated["name"], "Drafts");

    let list = handle_method(&ctx, "category.list", &json!({})).await.unwrap();
    assert_eq!(list.as_array().unwrap().len(), 1);

    handle_method(&ctx, "category.delete", &json!({"id": id})).await.unwrap();
    let list = handle_method(&ctx, "category.list", &json!({})).await.unwrap();
    assert!(list.as_array().unwrap().is_empty());

    let err = handle_method(&ctx, "category.create", &json!({"name": " ", "color": "#fff"}))
        .await
        .unwrap_err();
    assert!(!err.is_empty());
}

// ─── Likes ───

#[tokio::test]
async fn test_like_seed_and_toggle() {
    let api = MockApi::new();
    api.put_like(LikeState::new("7", false, 3));
    let (ctx, _rx) = setup(&api);
    login(&ctx).await;

    handle_method(
        &ctx,
        "like.seed",
        &json!({"contentId": "7", "isLiked": false, "likesCount": 3}),
    )
    .await
    .unwrap();

    let res = handle_method(&ctx, "like.toggle", &json!({"contentId": "7"}))
        .await
        .unwrap();
    assert_eq!(res, json!({"contentId": "7", "isLiked": true, "likesCount": 4}));

    let res = handle_method(&ctx, "like.get", &json!({"contentId": "7"})).await.unwrap();
    assert_eq!(res["isLiked"], true);
    let res = handle_method(&ctx, "like.get", &json!({"contentId": "8"})).await.unwrap();
    assert_eq!(res, Value::Null);
}

// ─── Trending ───

#[tokio::test]
async fn test_trending_refresh_adds_age_labels() {
    let api = MockApi::new();
    api.put_trending(vec![trending_entry("a", 2.0, at(1)), trending_entry("b", 5.0, at(2))]);
    let (ctx, _rx) = setup(&api);

    let empty = handle_method(&ctx, "trending.list", &json!({})).await.unwrap();
    assert_eq!(empty["generation"], 0);

    let res = handle_method(&ctx, "trending.refresh", &json!({})).await.unwrap();
    assert_eq!(res["generation"], 1);
    let entries = res["entries"].as_array().unwrap();
    assert_eq!(entries[0]["contentId"], "b");
    assert!(entries[0]["ageLabel"].as_str().unwrap().ends_with("일 전"));
}

// ─── Subscriptions ───

#[tokio::test]
async fn test_subscribe_pushes_events_until_unsubscribed() {
    let api = MockApi::new();
    let (ctx, mut rx) = setup(&api);
    login(&ctx).await;

    let res = handle_method(&ctx, "subscribe", &json!({"kind": "bookmark", "id": "42"}))
        .await
        .unwrap();
    let handle = res["subscription"].as_u64().unwrap();
    assert_eq!(ctx.subscription_count(), 1);

    handle_method(&ctx, "bookmark.add", &json!({"contentId": "42"}))
        .await
        .unwrap();

    let first = rx.try_recv().unwrap();
    assert_eq!(first["event"], "entity.changed");
    assert_eq!(first["subscription"], handle);
    assert_eq!(first["data"]["phase"], "speculative");
    assert_eq!(first["data"]["id"], "42");
    while rx.try_recv().is_ok() {}

    let res = handle_method(&ctx, "unsubscribe", &json!({"subscription": handle}))
        .await
        .unwrap();
    assert_eq!(res, json!({"ok": true}));
    assert_eq!(ctx.subscription_count(), 0);

    handle_method(&ctx, "bookmark.remove", &json!({"contentId": "42"}))
        .await
        .unwrap();
    assert!(rx.try_recv().is_err());

    let res = handle_method(&ctx, "unsubscribe", &json!({"subscription": handle}))
        .await
        .unwrap();
    assert_eq!(res, json!({"ok": false}));
}

#[tokio::test]
async fn test_subscribe_rejects_unknown_kind() {
    let api = MockApi::new();
    let (ctx, _rx) = setup(&api);

    let err = handle_method(&ctx, "subscribe", &json!({"kind": "tab"}))
        .await
        .unwrap_err();
    assert!(err.contains("unknown kind"));
}

// ─── Ordering ───

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_calls_started_in_line_order_apply_in_line_order() {
    for _ in 0..50 {
        let api = MockApi::gated();
        let (ctx, _rx) = setup(&api);
        login(&ctx).await;

        // same shape as the server loop: start in order, await on spawned tasks
        let add = start_method(&ctx, "bookmark.add", &json!({"contentId": "9"}));
        let remove = start_method(&ctx, "bookmark.remove", &json!({"contentId": "9"}));
        let add = tokio::spawn(add);
        let remove = tokio::spawn(remove);

        api.release(2);
        assert!(add.await.unwrap().is_ok());
        assert_eq!(remove.await.unwrap(), Ok(json!({"ok": true})));
        assert!(api.server_bookmarks().is_empty());
        assert_eq!(
            api.calls().iter().filter(|c| c.contains(" 9")).cloned().collect::<Vec<_>>(),
            vec!["create_bookmark 9".to_string(), "delete_bookmark 9".to_string()]
        );
    }
}

#[tokio::test]
async fn test_login_opens_the_session_before_lists_load() {
    let api = MockApi::new();
    let (ctx, _rx) = setup(&api);

    let loading = start_method(
        &ctx,
        "session.login",
        &json!({"userId": "u-1", "accessToken": "token-1"}),
    );
    let add = start_method(&ctx, "bookmark.add", &json!({"contentId": "5"}));

    assert!(add.await.is_ok());
    assert_eq!(loading.await, Ok(json!({"ok": true})));
}
