//! Unit tests for like toggling.

#[path = "../common/mod.rs"]
mod common;

use std::sync::{Arc, Mutex};

use common::{app_over, signed_in_app, MockApi};
use promptshelf::types::entity::EntitySnapshot;
use promptshelf::types::errors::EngagementError;
use promptshelf::types::like::LikeState;

#[tokio::test]
async fn toggle_requires_a_session() {
    let api = MockApi::new();
    let app = app_over(&api);

    assert_eq!(app.likes.toggle("7").await, Err(EngagementError::Unauthenticated));
    assert!(app.likes.like_state("7").is_none());
}

#[tokio::test]
async fn toggle_applies_then_takes_the_server_counts() {
    let api = MockApi::gated();
    api.put_like(LikeState::new("7", false, 40));
    let app = signed_in_app(&api).await;
    app.likes.seed(LikeState::new("7", false, 10));

    let pending = app.likes.toggle("7");
    assert_eq!(app.likes.like_state("7"), Some(LikeState::new("7", true, 11)));

    api.release(1);
    let state = pending.await.unwrap();

    assert_eq!(state, LikeState::new("7", true, 41));
    assert_eq!(app.likes.like_state("7"), Some(LikeState::new("7", true, 41)));
}

#[tokio::test]
async fn unknown_state_toggles_from_zero() {
    let api = MockApi::new();
    let app = signed_in_app(&api).await;

    let state = app.likes.toggle("9").await.unwrap();

    assert_eq!(state, LikeState::new("9", true, 1));
}

#[tokio::test]
async fn failed_toggle_restores_flag_and_count_together() {
    let api = MockApi::new();
    let app = signed_in_app(&api).await;
    app.likes.seed(LikeState::new("7", true, 5));
    api.set_offline(true);

    let observed = Arc::new(Mutex::new(Vec::new()));
    let sink = observed.clone();
    let _sub = app.likes.observe("7", move |event| {
        if let EntitySnapshot::Like(Some(state)) = &event.snapshot {
            sink.lock().unwrap().push((state.is_liked, state.likes_count));
        }
    });

    let result = app.likes.toggle("7").await;

    assert!(matches!(result, Err(EngagementError::NetworkError(_))));
    assert_eq!(app.likes.like_state("7"), Some(LikeState::new("7", true, 5)));
    // never a flag without its count
    assert_eq!(*observed.lock().unwrap(), vec![(false, 4), (true, 5)]);
}

#[tokio::test]
async fn two_queued_toggles_on_content_7_apply_in_order() {
    let api = MockApi::gated();
    api.put_like(LikeState::new("7", false, 10));
    let app = signed_in_app(&api).await;
    app.likes.seed(LikeState::new("7", false, 10));

    let first = app.likes.toggle("7");
    let second = app.likes.toggle("7");
    assert_eq!(app.likes.like_state("7"), Some(LikeState::new("7", false, 10)));
    assert_eq!(app.store.likes.pending_count("7"), 2);

    api.wait_for_calls("toggle_like", 1).await;
    assert_eq!(api.count_calls("toggle_like"), 1);

    api.release(2);
    let after_first = first.await.unwrap();
    let after_second = second.await.unwrap();

    assert_eq!(after_first, LikeState::new("7", true, 11));
    assert_eq!(after_second, LikeState::new("7", false, 10));
    assert_eq!(api.server_like("7"), Some(LikeState::new("7", false, 10)));
    assert_eq!(app.likes.like_state("7"), Some(LikeState::new("7", false, 10)));
    assert_eq!(app.store.likes.pending_count("7"), 0);
}

#[tokio::test]
async fn seeding_does_not_override_an_in_flight_toggle() {
    let api = MockApi::gated();
    let app = signed_in_app(&api).await;
    app.likes.seed(LikeState::new("7", false, 10));

    let pending = app.likes.toggle("7");
    app.likes.seed(LikeState::new("7", false, 12));
    assert_eq!(app.likes.like_state("7"), Some(LikeState::new("7", true, 13)));

    api.release(1);
    pending.await.unwrap();
}

#[tokio::test]
async fn celebration_fires_only_when_the_toggle_ends_liked() {
    let api = MockApi::new();
    let app = signed_in_app(&api).await;
    let mut celebrations = app.likes.celebrations();

    app.likes.toggle("7").await.unwrap();
    assert_eq!(celebrations.try_recv().ok(), Some("7".to_string()));

    app.likes.toggle("7").await.unwrap();
    assert!(celebrations.try_recv().is_err());
}
