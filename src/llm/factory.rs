// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Provider factory for creating LLM providers
//!
//! Centralizes key resolution, model selection and key validation so the CLI
//! and embedding hosts build providers the same way.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::{PersistedState, Settings};
use crate::error::{AssistError, Result};
use crate::llm::provider::{LlmProvider, ModelInfo};
use crate::llm::providers::{AnthropicProvider, OpenAiProvider};

/// Supported provider backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    /// Identifier used in settings and the state file
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
        }
    }

    /// Human-readable vendor name
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Anthropic => "Anthropic",
        }
    }

    fn api_key_env(&self, settings: &Settings) -> String {
        match self {
            ProviderKind::OpenAi => settings.providers.openai.api_key_env.clone(),
            ProviderKind::Anthropic => settings.providers.anthropic.api_key_env.clone(),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = AssistError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            other => Err(AssistError::InvalidInput(format!(
                "Unknown provider '{}'. Supported: {}",
                other,
                ProviderFactory::supported_providers().join(", ")
            ))),
        }
    }
}

/// Factory for creating LLM providers
pub struct ProviderFactory;

impl ProviderFactory {
    /// Build a provider for `kind` with an explicit key, applying the
    /// configured base URL and default model.
    pub fn create_with_key(
        kind: ProviderKind,
        api_key: &str,
        settings: &Settings,
    ) -> Result<Arc<dyn LlmProvider>> {
        let provider: Arc<dyn LlmProvider> = match kind {
            ProviderKind::OpenAi => {
                let config = &settings.providers.openai;
                let provider = match &config.base_url {
                    Some(base_url) => OpenAiProvider::with_base_url(api_key, base_url)?,
                    None => OpenAiProvider::new(api_key)?,
                };
                Arc::new(provider)
            }
            ProviderKind::Anthropic => {
                let config = &settings.providers.anthropic;
                let provider = match &config.base_url {
                    Some(base_url) => AnthropicProvider::with_base_url(api_key, base_url)?,
                    None => AnthropicProvider::new(api_key)?,
                };
                Arc::new(provider.with_streaming(config.stream))
            }
        };

        provider.set_model(&Self::default_model(kind, settings))?;
        tracing::debug!(provider = %kind, model = %provider.model(), "provider created");
        Ok(provider)
    }

    /// Build a provider for `kind`, resolving the key from the environment,
    /// the settings file, then the remembered state, in that order.
    pub fn create(
        kind: ProviderKind,
        settings: &Settings,
        state: &PersistedState,
    ) -> Result<Arc<dyn LlmProvider>> {
        let api_key = Self::resolve_api_key(kind, settings, state).ok_or_else(|| {
            AssistError::Config(format!(
                "No {} API key found. Set {} env var or run 'codeassist key set {}'.",
                kind.display_name(),
                kind.api_key_env(settings),
                kind
            ))
        })?;

        Self::create_with_key(kind, &api_key, settings)
    }

    /// Validate `api_key` against the provider and remember it on success.
    /// The caller persists `state`.
    pub async fn connect(
        kind: ProviderKind,
        api_key: &str,
        model: Option<&str>,
        settings: &Settings,
        state: &mut PersistedState,
    ) -> Result<Arc<dyn LlmProvider>> {
        let provider = Self::create_with_key(kind, api_key, settings)?;
        if let Some(model) = model {
            provider.set_model(model)?;
        }

        if !provider.validate_key(api_key).await {
            tracing::warn!(provider = %kind, "API key rejected");
            return Err(AssistError::InvalidApiKey(kind.display_name().to_string()));
        }

        state.remember_key(kind.as_str(), api_key, Some(&provider.model()));
        tracing::info!(provider = %kind, "API key validated");
        Ok(provider)
    }

    /// Resolve the API key without touching the network
    pub fn resolve_api_key(
        kind: ProviderKind,
        settings: &Settings,
        state: &PersistedState,
    ) -> Option<String> {
        let configured = match kind {
            ProviderKind::OpenAi => settings.get_openai_api_key(),
            ProviderKind::Anthropic => settings.get_anthropic_api_key(),
        };
        configured.or_else(|| state.api_key(kind.as_str()))
    }

    /// Get the default model for a provider
    pub fn default_model(kind: ProviderKind, settings: &Settings) -> String {
        match kind {
            ProviderKind::OpenAi => settings.providers.openai.default_model.clone(),
            ProviderKind::Anthropic => settings.providers.anthropic.default_model.clone(),
        }
    }

    /// Pick the provider: explicit request, then the last one used, then the
    /// configured default.
    pub fn resolve_kind(
        requested: Option<&str>,
        settings: &Settings,
        state: &PersistedState,
    ) -> Result<ProviderKind> {
        requested
            .or(state.last_service_type.as_deref())
            .unwrap_or(settings.defaults.provider.as_str())
            .parse()
    }

    /// Check if a provider has a key available
    pub fn is_configured(kind: ProviderKind, settings: &Settings, state: &PersistedState) -> bool {
        Self::resolve_api_key(kind, settings, state).is_some()
    }

    /// Model catalogue for `kind`, available without a key
    pub fn models(kind: ProviderKind) -> Vec<ModelInfo> {
        match kind {
            ProviderKind::OpenAi => OpenAiProvider::models(),
            ProviderKind::Anthropic => AnthropicProvider::models(),
        }
    }

    /// List all supported provider names
    pub fn supported_providers() -> &'static [&'static str] {
        &["openai", "anthropic"]
    }
}
