// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use codeassist::config::{PersistedState, Settings};
use codeassist::llm::factory::{ProviderFactory, ProviderKind};
use tempfile::TempDir;

#[test]
fn test_settings_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");

    let mut settings = Settings::default();
    settings.defaults.provider = "anthropic".to_string();
    settings.chat.max_history_records = 10;
    settings.composer.max_attempts = 5;
    settings.autocomplete.inactivity_delay_ms = 1500;
    settings.save_to(&path).unwrap();

    let loaded = Settings::load_from(&path).unwrap();
    assert_eq!(loaded.defaults.provider, "anthropic");
    assert_eq!(loaded.chat.max_history_records, 10);
    assert_eq!(loaded.composer.max_attempts, 5);
    assert_eq!(loaded.autocomplete.inactivity_delay_ms, 1500);
}

#[test]
fn test_missing_settings_file_gives_defaults() {
    let dir = TempDir::new().unwrap();
    let loaded = Settings::load_from(&dir.path().join("absent.json")).unwrap();

    assert_eq!(loaded.defaults.provider, "openai");
    assert_eq!(loaded.chat.max_history_records, 6);
    assert_eq!(loaded.composer.max_attempts, 3);
    assert!(loaded.validate().is_ok());
}

#[test]
fn test_partial_settings_file_fills_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{ "composer": { "max_attempts": 2 } }"#).unwrap();

    let loaded = Settings::load_from(&path).unwrap();
    assert_eq!(loaded.composer.max_attempts, 2);
    assert_eq!(loaded.providers.openai.default_model, "gpt-4o-mini");
}

#[test]
fn test_save_keeps_unknown_fields() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{ "editor": { "theme": "dark" } }"#).unwrap();

    let settings = Settings::load_from(&path).unwrap();
    settings.save_to(&path).unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["editor"]["theme"], "dark");
    assert!(raw["providers"].is_object());
}

#[test]
fn test_env_key_beats_settings_key() {
    let mut settings = Settings::default();
    settings.providers.openai.api_key_env = "CODEASSIST_CONFIG_TEST_OPENAI_KEY".to_string();
    settings.providers.openai.api_key = Some("sk-file".to_string());
    assert_eq!(settings.get_openai_api_key().as_deref(), Some("sk-file"));

    std::env::set_var("CODEASSIST_CONFIG_TEST_OPENAI_KEY", "sk-env");
    assert_eq!(settings.get_openai_api_key().as_deref(), Some("sk-env"));
    std::env::remove_var("CODEASSIST_CONFIG_TEST_OPENAI_KEY");
}

#[test]
fn test_state_round_trip_and_forget() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("state.json");

    let mut state = PersistedState::default();
    state.remember_key("openai", "sk-one", Some("gpt-4o"));
    state.remember_key("anthropic", "ant-two", None);
    state.save_to(&path).unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["openai_api_key"], "sk-one");
    assert_eq!(raw["anthropic_api_key"], "ant-two");
    assert_eq!(raw["last_service_type"], "anthropic");

    let mut loaded = PersistedState::load_from(&path).unwrap();
    assert_eq!(loaded.api_key("openai").as_deref(), Some("sk-one"));
    assert_eq!(loaded.providers_with_keys(), vec!["anthropic", "openai"]);
    assert!(loaded.updated_at.is_some());

    assert!(loaded.forget_key("anthropic"));
    assert!(!loaded.forget_key("anthropic"));
    assert!(loaded.last_service_type.is_none());
    assert_eq!(loaded.providers_with_keys(), vec!["openai"]);
}

#[test]
fn test_remembered_key_feeds_factory() {
    let mut settings = Settings::default();
    settings.providers.anthropic.api_key_env = "CODEASSIST_CONFIG_TEST_NO_ANTHROPIC_KEY".to_string();

    let mut state = PersistedState::default();
    assert!(!ProviderFactory::is_configured(ProviderKind::Anthropic, &settings, &state));

    state.remember_key("anthropic", "ant-key", None);
    assert!(ProviderFactory::is_configured(ProviderKind::Anthropic, &settings, &state));
    assert_eq!(
        ProviderFactory::resolve_kind(None, &settings, &state).unwrap(),
        ProviderKind::Anthropic
    );
}
