// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LLM Provider trait and related types
//!
//! Defines the abstraction layer for different LLM backends. A provider only
//! describes its wire format through [`LlmProvider::complete`] and
//! [`LlmProvider::complete_stream`]; chat, autocomplete, code integration and
//! bug analysis are built on top of those two calls.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

use crate::editor::LineError;
use crate::error::{AssistError, Result};
use crate::history::ChatHistoryStore;
use crate::llm::message::ChatTurn;
use crate::llm::prompts;
use crate::llm::providers::common::strip_code_fences;

/// Lazy sequence of text chunks produced by a chat request
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Main trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name (e.g., "anthropic", "openai")
    fn name(&self) -> &str;

    /// List available models
    fn available_models(&self) -> Vec<ModelInfo>;

    /// Check if a specific model is supported
    fn supports_model(&self, model: &str) -> bool {
        self.available_models().iter().any(|m| m.id == model)
    }

    /// Human-readable model name, falling back to the id
    fn model_display_name(&self, model: &str) -> String {
        self.available_models()
            .into_iter()
            .find(|m| m.id == model)
            .map(|m| m.display_name)
            .unwrap_or_else(|| model.to_string())
    }

    /// Currently selected model
    fn model(&self) -> String;

    /// Select another model from [`LlmProvider::available_models`]
    fn set_model(&self, model: &str) -> Result<()>;

    /// Issue a minimal request with `api_key`. Any failure reports `false`.
    async fn validate_key(&self, api_key: &str) -> bool;

    /// Non-streaming completion returning the response text
    async fn complete(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<String>;

    /// Streaming completion returning text chunks. Providers without
    /// streaming support synthesize a single-chunk stream.
    async fn complete_stream(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkStream>;

    /// Send `prompt` as the next user turn of `history`.
    ///
    /// The user turn is recorded before the request is issued, so a failed
    /// request still leaves it in history. The assistant turn is appended and
    /// the history truncated only once the returned stream is consumed to
    /// its natural end.
    async fn chat(
        &self,
        prompt: &str,
        history: &ChatHistoryStore,
        cancel: CancellationToken,
    ) -> Result<ChunkStream> {
        history.append(ChatTurn::user(prompt));

        let request = CompletionRequest::new(self.model(), history.all())
            .with_system(prompts::CHAT_SYSTEM_PROMPT);

        let inner = self.complete_stream(request, cancel).await?;
        Ok(record_reply(inner, history.clone()))
    }

    /// Ask for an inline completion at the cursor. Empty means no suggestion.
    async fn auto_complete(
        &self,
        request: AutoCompleteRequest,
        cancel: CancellationToken,
    ) -> Result<String> {
        tracing::debug!(
            provider = self.name(),
            file_extension = %request.file_extension,
            language = %request.language_name,
            "autocomplete request"
        );

        let completion = CompletionRequest::new(
            self.model(),
            vec![ChatTurn::user(prompts::autocomplete_prompt(&request))],
        )
        .with_system(prompts::AUTOCOMPLETE_SYSTEM_PROMPT)
        .with_temperature(0.0);

        let content = self.complete(completion, cancel).await?;
        Ok(strip_code_fences(&content))
    }

    /// Ask for a complete replacement of `original_code`
    async fn integrate_code(
        &self,
        request: IntegrationRequest,
        cancel: CancellationToken,
    ) -> Result<String> {
        let completion = CompletionRequest::new(
            self.model(),
            vec![ChatTurn::user(prompts::integration_prompt(&request))],
        )
        .with_system(prompts::INTEGRATION_SYSTEM_PROMPT)
        .with_temperature(0.0);

        let content = self.complete(completion, cancel).await?;
        Ok(strip_code_fences(&content))
    }

    /// Ask for a bug report. The response must be the [`BugReport`] JSON shape.
    async fn analyze_bugs(
        &self,
        request: BugAnalysisRequest,
        cancel: CancellationToken,
    ) -> Result<BugReport> {
        let completion = CompletionRequest::new(
            self.model(),
            vec![ChatTurn::user(prompts::bug_analysis_prompt(&request))],
        )
        .with_system(prompts::BUG_ANALYSIS_SYSTEM_PROMPT)
        .with_temperature(0.0);

        let content = self.complete(completion, cancel).await?;
        BugReport::parse(&content)
    }
}

/// Wrap a provider stream so that natural completion records the assistant
/// turn. Errors, cancellation and early drops leave history untouched.
pub fn record_reply(inner: ChunkStream, history: ChatHistoryStore) -> ChunkStream {
    Box::pin(async_stream::try_stream! {
        let mut inner = inner;
        let mut reply = String::new();

        while let Some(chunk) = inner.next().await {
            let chunk = chunk?;
            reply.push_str(&chunk);
            yield chunk;
        }

        history.append(ChatTurn::assistant(reply));
        history.truncate(history.max_records());
    })
}

/// Request for completion
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model to use
    pub model: String,

    /// Messages in the conversation
    pub messages: Vec<ChatTurn>,

    /// System prompt
    pub system: Option<String>,

    /// Maximum tokens in response
    pub max_tokens: u32,

    /// Sampling temperature; provider default when unset
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Create a new completion request
    pub fn new(model: impl Into<String>, messages: Vec<ChatTurn>) -> Self {
        Self {
            model: model.into(),
            messages,
            system: None,
            max_tokens: 8192,
            temperature: None,
        }
    }

    /// Set the system prompt
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Inline completion around the cursor
#[derive(Debug, Clone, Default)]
pub struct AutoCompleteRequest {
    /// Text before the cursor
    pub prefix: String,
    /// Text after the cursor
    pub suffix: String,
    /// Types and symbols available in the file
    pub extra_context: String,
    /// Recently copied text
    pub clipboard_text: String,
    /// File extension or language id, e.g. "rs"
    pub file_extension: String,
    /// Human-readable language name
    pub language_name: String,
}

/// Whole-file rewrite
#[derive(Debug, Clone, Default)]
pub struct IntegrationRequest {
    /// Current file content
    pub original_code: String,
    /// Optional snippet to merge in; empty when only modifying
    pub new_code: String,
    /// Natural-language instruction
    pub user_prompt: String,
    /// File extension
    pub file_extension: String,
    /// Human-readable language name
    pub language_name: String,
    /// Errors the rewrite should fix
    pub errors: Vec<LineError>,
}

/// Bug analysis of a whole file
#[derive(Debug, Clone, Default)]
pub struct BugAnalysisRequest {
    /// Code to analyze
    pub code: String,
    /// File extension
    pub file_extension: String,
    /// Human-readable language name
    pub language_name: String,
    /// Program input the user expects to run with
    pub input: String,
    /// Standard input the user expects to feed
    pub stdin: String,
}

/// Structured bug report returned by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BugReport {
    pub has_bugs: bool,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub fixed_code: Option<String>,
}

impl BugReport {
    /// Parse provider content as a bug report
    pub fn parse(content: &str) -> Result<Self> {
        serde_json::from_str(content.trim()).map_err(|e| {
            tracing::warn!(error = %e, "bug analysis response was not valid JSON");
            AssistError::InvalidResponseFormat(e.to_string())
        })
    }
}

/// Information about a model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    /// Model identifier
    pub id: String,

    /// Human-readable name
    pub display_name: String,

    /// One-line description
    pub description: String,
}

impl ModelInfo {
    pub fn new(id: &str, display_name: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            description: description.to_string(),
        }
    }
}

/// Active provider selection
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub model: String,
    pub display_name: String,
    pub description: String,
}

impl ProviderConfig {
    /// Build a config for `model` from `models`. The key must be non-blank and
    /// the model must belong to the catalogue.
    pub fn new(api_key: impl Into<String>, model: &str, models: &[ModelInfo]) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AssistError::Config("API key is required.".to_string()));
        }
        let info = models
            .iter()
            .find(|m| m.id == model)
            .ok_or_else(|| AssistError::InvalidInput("Invalid model selected".to_string()))?;

        Ok(Self {
            api_key,
            model: info.id.clone(),
            display_name: info.display_name.clone(),
            description: info.description.clone(),
        })
    }

    /// Switch to another catalogue model, leaving the key untouched
    pub fn select_model(&mut self, model: &str, models: &[ModelInfo]) -> Result<()> {
        let info = models
            .iter()
            .find(|m| m.id == model)
            .ok_or_else(|| AssistError::InvalidInput("Invalid model selected".to_string()))?;
        self.model = info.id.clone();
        self.display_name = info.display_name.clone();
        self.description = info.description.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalogue() -> Vec<ModelInfo> {
        vec![
            ModelInfo::new("small", "Small", "Fast"),
            ModelInfo::new("large", "Large", "Capable"),
        ]
    }

    #[test]
    fn test_completion_request_new() {
        let request = CompletionRequest::new("gpt-4o", vec![ChatTurn::user("Hello")]);

        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.max_tokens, 8192);
        assert!(request.temperature.is_none());
        assert!(request.system.is_none());
    }

    #[test]
    fn test_completion_request_chained() {
        let request = CompletionRequest::new("gpt-4o", vec![])
            .with_system("System prompt")
            .with_max_tokens(2048)
            .with_temperature(0.0);

        assert_eq!(request.system, Some("System prompt".to_string()));
        assert_eq!(request.max_tokens, 2048);
        assert_eq!(request.temperature, Some(0.0));
    }

    #[test]
    fn test_bug_report_parse() {
        let report = BugReport::parse(
            r#"{"hasBugs": true, "explanation": "off by one", "fixedCode": "fn main() {}"}"#,
        )
        .unwrap();

        assert!(report.has_bugs);
        assert_eq!(report.explanation, "off by one");
        assert_eq!(report.fixed_code.as_deref(), Some("fn main() {}"));
    }

    #[test]
    fn test_bug_report_parse_without_fix() {
        let report = BugReport::parse(r#"{"hasBugs": false}"#).unwrap();
        assert!(!report.has_bugs);
        assert!(report.fixed_code.is_none());
    }

    #[test]
    fn test_bug_report_parse_failure_is_invalid_format() {
        let err = BugReport::parse("Sure! Here is the analysis:").unwrap_err();
        assert!(matches!(err, AssistError::InvalidResponseFormat(_)));
    }

    #[test]
    fn test_provider_config_requires_key() {
        let err = ProviderConfig::new("   ", "small", &catalogue()).unwrap_err();
        assert!(err.to_string().contains("API key is required"));
    }

    #[test]
    fn test_provider_config_rejects_unknown_model() {
        let err = ProviderConfig::new("sk-test", "huge", &catalogue()).unwrap_err();
        assert!(err.to_string().contains("Invalid model selected"));
    }

    #[test]
    fn test_provider_config_select_model() {
        let mut config = ProviderConfig::new("sk-test", "small", &catalogue()).unwrap();
        assert_eq!(config.display_name, "Small");

        config.select_model("large", &catalogue()).unwrap();
        assert_eq!(config.model, "large");
        assert_eq!(config.description, "Capable");
        assert_eq!(config.api_key, "sk-test");

        assert!(config.select_model("huge", &catalogue()).is_err());
        assert_eq!(config.model, "large");
    }
}
