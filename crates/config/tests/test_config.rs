//! Tests for loading, saving and resolving configuration

use gaia_config::{Config, ConfigError, EndpointFlavor};
use std::path::PathBuf;
use tempfile::TempDir;

/// Helper to create a temporary directory for tests
fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

#[tokio::test]
async fn test_load_missing_file_gives_defaults() {
    let dir = temp_dir();
    let config = Config::load_from(&dir.path().join("absent.json"))
        .await
        .unwrap();
    assert_eq!(config.agent.max_round_trips, 12);
    assert!(config.model.api_key.is_empty());
}

#[tokio::test]
async fn test_save_then_load_preserves_values() {
    let dir = temp_dir();
    let path = dir.path().join("nested").join("config.json");

    let mut config = Config::default();
    config.model.flavor = EndpointFlavor::Azure;
    config.model.api_base = Some("https://res.openai.azure.com".to_string());
    config.model.model = "gaia-4o".to_string();
    config.agent.max_round_trips = 5;
    config.tools.code_timeout_secs = 5;
    config.driver.concurrency = 4;
    config.save_to(&path).await.unwrap();

    let loaded = Config::load_from(&path).await.unwrap();
    assert_eq!(loaded.model.flavor, EndpointFlavor::Azure);
    assert_eq!(loaded.model.model, "gaia-4o");
    assert_eq!(loaded.agent.max_round_trips, 5);
    assert_eq!(loaded.tools.code_timeout_secs, 5);
    assert_eq!(loaded.driver.concurrency, 4);
}

#[tokio::test]
async fn test_saved_file_uses_lowercase_flavor() {
    let dir = temp_dir();
    let path = dir.path().join("config.json");
    let mut config = Config::default();
    config.model.flavor = EndpointFlavor::Azure;
    config.save_to(&path).await.unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.contains("\"flavor\": \"azure\""));
}

#[tokio::test]
async fn test_load_invalid_json_is_error() {
    let dir = temp_dir();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    let result = Config::load_from(&path).await;
    assert!(matches!(result, Err(ConfigError::Json(_))));
}

#[tokio::test]
async fn test_system_prompt_from_yaml_file() {
    let dir = temp_dir();
    let prompt_path = dir.path().join("system_prompt.yaml");
    std::fs::write(
        &prompt_path,
        "system_prompt: |\n  Answer tersely.\n  FINAL ANSWER: always last.\n",
    )
    .unwrap();

    let mut config = Config::default();
    config.agent.system_prompt_path = Some(prompt_path.to_string_lossy().into_owned());

    let prompt = config.system_prompt().await.unwrap();
    assert!(prompt.starts_with("Answer tersely."));
}

#[tokio::test]
async fn test_system_prompt_missing_file() {
    let mut config = Config::default();
    config.agent.system_prompt_path = Some("/nonexistent/gaia/prompt.yaml".to_string());

    match config.system_prompt().await {
        Err(ConfigError::NotFound(path)) => {
            assert_eq!(path, PathBuf::from("/nonexistent/gaia/prompt.yaml"))
        }
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[test]
fn test_error_display() {
    let err = ConfigError::MissingPromptKey(PathBuf::from("/p.yaml"));
    assert_eq!(err.to_string(), "prompt file /p.yaml has no `system_prompt` key");

    let err = ConfigError::NotFound(PathBuf::from("/some/path"));
    assert!(err.to_string().contains("/some/path"));
}
