// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for codeassist
//!
//! Handles loading and saving settings from ~/.codeassist/settings.json

use serde::{Deserialize, Serialize};

mod io;
mod migration;
mod validation;

/// Main settings structure, stored in ~/.codeassist/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// LLM provider configurations
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Default settings for new sessions
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Chat history settings
    #[serde(default)]
    pub chat: ChatConfig,

    /// Composer retry settings
    #[serde(default)]
    pub composer: ComposerConfig,

    /// Inline suggestion timing
    #[serde(default)]
    pub autocomplete: AutocompleteConfig,
}

/// Configuration for LLM providers
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    /// OpenAI configuration
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Anthropic Claude configuration
    #[serde(default)]
    pub anthropic: AnthropicConfig,
}

/// OpenAI-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API key (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for API key
    #[serde(default = "default_openai_api_key_env")]
    pub api_key_env: String,

    /// Default model to use
    #[serde(default = "default_openai_model")]
    pub default_model: String,

    /// Base URL for API (everything before `/chat/completions`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Anthropic-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    /// API key (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for API key
    #[serde(default = "default_anthropic_api_key_env")]
    pub api_key_env: String,

    /// Default model to use
    #[serde(default = "default_anthropic_model")]
    pub default_model: String,

    /// Messages endpoint (for custom endpoints)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Stream chat replies as server-sent events
    #[serde(default)]
    pub stream: bool,
}

/// Default settings for new sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Provider used when neither the command line nor the saved state names one
    #[serde(default = "default_provider")]
    pub provider: String,
}

/// Chat history settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Turns kept between the first and the latest turn after each reply
    #[serde(default = "default_max_history_records")]
    pub max_history_records: usize,
}

/// Composer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposerConfig {
    /// Provider attempts before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Inline suggestion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutocompleteConfig {
    /// Whether suggestions are offered at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Wait after an edit before the first inactivity check
    #[serde(default = "default_suggest_delay_ms")]
    pub suggest_delay_ms: u64,

    /// Quiet time required before a suggestion is requested
    #[serde(default = "default_inactivity_delay_ms")]
    pub inactivity_delay_ms: u64,
}

fn default_openai_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_anthropic_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-5-sonnet-latest".to_string()
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_max_history_records() -> usize {
    crate::history::DEFAULT_MAX_RECORDS
}

fn default_max_attempts() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_suggest_delay_ms() -> u64 {
    350
}

fn default_inactivity_delay_ms() -> u64 {
    2000
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_openai_api_key_env(),
            default_model: default_openai_model(),
            base_url: None,
        }
    }
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_anthropic_api_key_env(),
            default_model: default_anthropic_model(),
            base_url: None,
            stream: false,
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_history_records: default_max_history_records(),
        }
    }
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for AutocompleteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            suggest_delay_ms: default_suggest_delay_ms(),
            inactivity_delay_ms: default_inactivity_delay_ms(),
        }
    }
}
