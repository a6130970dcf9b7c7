//! Unit tests for the SettingsEngine public API and environment overrides.

use promptshelf::services::settings_engine::{
    apply_overrides, SettingsEngine, SettingsEngineTrait, ENV_API_URL, ENV_LOG,
};
use promptshelf::types::settings::ClientSettings;
use tempfile::TempDir;

/// Helper: a SettingsEngine backed by a temp directory the caller keeps alive.
fn engine_in_temp(dir: &TempDir) -> SettingsEngine {
    let path = dir
        .path()
        .join("settings.json")
        .to_string_lossy()
        .to_string();
    SettingsEngine::new(Some(path))
}

#[test]
fn test_load_defaults_when_no_config_file_exists() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);

    let settings = engine.load().unwrap();

    assert_eq!(settings, ClientSettings::default());
    assert_eq!(settings.api.base_url, "http://localhost:3000/api");
    assert_eq!(settings.trending.limit, 10);
    assert_eq!(settings.trending.refresh_interval_secs, 300);
    assert_eq!(settings.trending.rotation_interval_secs, 3);
    assert!(!settings.categories.enforce_unique_names);
}

#[test]
fn test_set_value_persists_changes() {
    let dir = TempDir::new().unwrap();
    {
        let mut engine = engine_in_temp(&dir);
        engine.load().unwrap();
        engine.set_value("trending.limit", serde_json::json!(20)).unwrap();
        engine
            .set_value("categories.enforce_unique_names", serde_json::Value::Bool(true))
            .unwrap();
    }

    let mut reloaded = engine_in_temp(&dir);
    let settings = reloaded.load().unwrap();
    assert_eq!(settings.trending.limit, 20);
    assert!(settings.categories.enforce_unique_names);
}

#[test]
fn test_set_value_rejects_unknown_keys_and_bad_values() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);
    engine.load().unwrap();

    assert!(engine.set_value("", serde_json::json!(1)).is_err());
    assert!(engine.set_value("trending.nope", serde_json::json!(1)).is_err());
    assert!(engine.set_value("nope.limit", serde_json::json!(1)).is_err());
    assert!(engine
        .set_value("trending.limit", serde_json::json!("ten"))
        .is_err());
    assert_eq!(engine.get_settings().trending.limit, 10);
}

#[test]
fn test_reset_restores_defaults() {
    let dir = TempDir::new().unwrap();
    let mut engine = engine_in_temp(&dir);
    engine.load().unwrap();
    engine
        .set_value("api.base_url", serde_json::json!("https://prompts.example/api"))
        .unwrap();

    engine.reset().unwrap();

    assert_eq!(*engine.get_settings(), ClientSettings::default());
}

#[test]
fn test_partial_file_fills_missing_sections_with_defaults() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("settings.json"),
        r#"{"api": {"base_url": "https://prompts.example/api", "request_timeout_secs": 5}}"#,
    )
    .unwrap();

    let mut engine = engine_in_temp(&dir);
    let settings = engine.load().unwrap();

    assert_eq!(settings.api.request_timeout_secs, 5);
    assert_eq!(settings.trending, ClientSettings::default().trending);
}

#[test]
fn test_load_malformed_json() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("settings.json"), "{ invalid json }").unwrap();

    let mut engine = engine_in_temp(&dir);
    assert!(engine.load().is_err());
}

#[test]
fn test_environment_overrides() {
    let settings = apply_overrides(ClientSettings::default(), |key| match key {
        k if k == ENV_API_URL => Some(" https://staging.example/api ".to_string()),
        k if k == ENV_LOG => Some("promptshelf=debug".to_string()),
        _ => None,
    });
    assert_eq!(settings.api.base_url, "https://staging.example/api");
    assert_eq!(settings.logging.level, "promptshelf=debug");

    let untouched = apply_overrides(ClientSettings::default(), |_| Some("   ".to_string()));
    assert_eq!(untouched, ClientSettings::default());
}

#[test]
fn test_default_config_path_uses_platform() {
    let engine = SettingsEngine::new(None);
    let path = engine.get_config_path();
    assert!(path.ends_with("settings.json"));
    assert!(path.to_lowercase().contains("promptshelf"));
}
