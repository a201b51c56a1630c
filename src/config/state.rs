// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Local key-value state remembered between runs
//!
//! Stored as a flat JSON object in ~/.codeassist/state.json. Validated API keys
//! live under `"<provider>_api_key"` next to `"last_service_type"`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::error::Result;

/// Persisted state file contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Provider chosen the last time a key was accepted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_service_type: Option<String>,

    /// Model chosen the last time a key was accepted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_model: Option<String>,

    /// RFC 3339 timestamp of the last write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,

    /// `"<provider>_api_key"` entries and anything else found in the file
    #[serde(flatten)]
    pub entries: BTreeMap<String, serde_json::Value>,
}

impl PersistedState {
    /// Get the default state file path.
    pub fn default_path() -> PathBuf {
        Settings::home_dir().join("state.json")
    }

    /// Load state from the default path.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load state from a specific path. A missing file is an empty state.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save state to the default path.
    pub fn save(&mut self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Save state to a specific path, stamping `updated_at`.
    pub fn save_to(&mut self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.updated_at = Some(chrono::Utc::now().to_rfc3339());
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn key_name(provider: &str) -> String {
        format!("{}_api_key", provider)
    }

    /// Remembered key for `provider`
    pub fn api_key(&self, provider: &str) -> Option<String> {
        self.entries
            .get(&Self::key_name(provider))
            .and_then(|v| v.as_str())
            .filter(|v| !v.trim().is_empty())
            .map(str::to_string)
    }

    /// Remember a validated key and make `provider` the current service
    pub fn remember_key(&mut self, provider: &str, api_key: &str, model: Option<&str>) {
        self.entries.insert(
            Self::key_name(provider),
            serde_json::Value::String(api_key.to_string()),
        );
        self.last_service_type = Some(provider.to_string());
        if let Some(model) = model {
            self.last_model = Some(model.to_string());
        }
    }

    /// Forget the key for `provider`. Returns whether one was stored.
    pub fn forget_key(&mut self, provider: &str) -> bool {
        let removed = self.entries.remove(&Self::key_name(provider)).is_some();
        if removed && self.last_service_type.as_deref() == Some(provider) {
            self.last_service_type = None;
            self.last_model = None;
        }
        removed
    }

    /// Providers with a remembered key
    pub fn providers_with_keys(&self) -> Vec<String> {
        self.entries
            .keys()
            .filter_map(|k| k.strip_suffix("_api_key"))
            .map(str::to_string)
            .collect()
    }
}
