//! Unit tests for category management.

#[path = "../common/mod.rs"]
mod common;

use common::{app_over, app_with_settings, signed_in_app, user, MockApi};
use promptshelf::types::bookmark::CategoryDraft;
use promptshelf::types::errors::EngagementError;
use promptshelf::types::settings::ClientSettings;
use rstest::rstest;

#[tokio::test]
async fn create_normalizes_and_refreshes_the_list() {
    let api = MockApi::new();
    let app = signed_in_app(&api).await;

    let created = app
        .categories
        .create(CategoryDraft::new("  Writing  ", "#3B82F6"))
        .await
        .unwrap();

    assert_eq!(created.name, "Writing");
    assert_eq!(created.color, "#3b82f6");
    assert_eq!(app.categories.categories().len(), 1);
    assert_eq!(app.categories.category(&created.id), Some(created));
}

#[rstest]
#[case::empty_name("   ", "#fff")]
#[case::bad_color("Work", "blue")]
#[case::short_hex("Work", "#12")]
#[tokio::test]
async fn invalid_drafts_never_reach_the_backend(#[case] name: &str, #[case] color: &str) {
    let api = MockApi::new();
    let app = signed_in_app(&api).await;

    let result = app.categories.create(CategoryDraft::new(name, color)).await;

    assert!(matches!(result, Err(EngagementError::InvalidCategory(_))));
    assert_eq!(api.count_calls("create_category"), 0);
}

#[tokio::test]
async fn duplicate_names_pass_unless_uniqueness_is_enforced() {
    let api = MockApi::new();
    api.put_category("Work", "#111111");
    let app = signed_in_app(&api).await;
    assert!(app.categories.create(CategoryDraft::new("work", "#222")).await.is_ok());

    let strict_api = MockApi::new();
    strict_api.put_category("Work", "#111111");
    let mut settings = ClientSettings::default();
    settings.categories.enforce_unique_names = true;
    let strict = app_with_settings(&strict_api, settings);
    strict.login(user()).await.unwrap();

    let result = strict.categories.create(CategoryDraft::new(" WORK ", "#222")).await;
    assert_eq!(result, Err(EngagementError::DuplicateCategoryName("WORK".to_string())));
}

#[tokio::test]
async fn update_may_keep_its_own_name_when_uniqueness_is_enforced() {
    let api = MockApi::new();
    let existing = api.put_category("Work", "#111111");
    let mut settings = ClientSettings::default();
    settings.categories.enforce_unique_names = true;
    let app = app_with_settings(&api, settings);
    app.login(user()).await.unwrap();

    let updated = app
        .categories
        .update(&existing.id, CategoryDraft::new("Work", "#00ff00"))
        .await
        .unwrap();

    assert_eq!(updated.color, "#00ff00");
    assert_eq!(app.categories.category(&existing.id).map(|c| c.color), Some("#00ff00".to_string()));
}

#[tokio::test]
async fn delete_cascades_to_bookmarks() {
    let api = MockApi::new();
    let category = api.put_category("Work", "#111111");
    api.put_bookmark("42", Some(&category.id));
    let app = signed_in_app(&api).await;
    assert_eq!(app.categories.categories()[0].bookmark_count, 1);

    app.categories.delete(&category.id).await.unwrap();

    assert!(app.categories.categories().is_empty());
    assert_eq!(app.bookmarks.bookmark("42").and_then(|b| b.category_id), None);
}

#[tokio::test]
async fn category_changes_require_a_session() {
    let api = MockApi::new();
    let app = app_over(&api);

    assert_eq!(
        app.categories.create(CategoryDraft::new("Work", "#fff")).await,
        Err(EngagementError::Unauthenticated)
    );
    assert_eq!(app.categories.delete("cat-1").await, Err(EngagementError::Unauthenticated));
    assert_eq!(app.categories.refresh().await, Err(EngagementError::Unauthenticated));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn backend_errors_surface_unchanged() {
    let api = MockApi::new();
    let app = signed_in_app(&api).await;

    let result = app.categories.delete("cat-404").await;

    assert!(matches!(result, Err(EngagementError::ServerError { status: 404, .. })));
}
