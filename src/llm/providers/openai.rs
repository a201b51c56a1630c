// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! OpenAI chat-completions provider implementation
//!
//! Chat replies are streamed as server-sent events; the other operations use
//! single JSON responses.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::{ApiError, AssistError, Result};
use crate::llm::message::ChatTurn;
use crate::llm::provider::{ChunkStream, CompletionRequest, LlmProvider, ModelInfo, ProviderConfig};
use crate::llm::providers::common::{
    parse_retry_after_seconds, read_json_cancellable, send_cancellable, status_error, LineBuffer,
};

const OPENAI_API_URL: &str = "https://api.openai.com/v1";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI provider
pub struct OpenAiProvider {
    client: Client,
    config: RwLock<ProviderConfig>,
    base_url: String,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider using the default model
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, OPENAI_API_URL)
    }

    /// Create with a custom base URL (everything before `/chat/completions`)
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let config = ProviderConfig::new(api_key, OPENAI_DEFAULT_MODEL, &Self::models())?;
        Ok(Self {
            client: Client::new(),
            config: RwLock::new(config),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Static model catalogue
    pub fn models() -> Vec<ModelInfo> {
        vec![
            ModelInfo::new("gpt-4o", "GPT-4o", "Most capable model, best for complex tasks"),
            ModelInfo::new(
                "gpt-4o-mini",
                "GPT-4o Mini",
                "Faster and more cost-effective than GPT-4o",
            ),
            ModelInfo::new("o1", "GPT-o1", "Uses advanced reasoning"),
            ModelInfo::new("o3-mini", "GPT-o3 Mini", "Fast at advanced reasoning"),
        ]
    }

    fn api_key(&self) -> String {
        match self.config.read() {
            Ok(config) => config.api_key.clone(),
            Err(poisoned) => poisoned.into_inner().api_key.clone(),
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Build the request body. The system prompt goes first in `messages`.
    fn build_request(&self, request: &CompletionRequest, stream: bool) -> OpenAiRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            messages.push(OpenAiMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.extend(request.messages.iter().map(OpenAiMessage::from));

        OpenAiRequest {
            model: request.model.clone(),
            messages,
            temperature: request.temperature,
            stream: stream.then_some(true),
        }
    }

    async fn post(
        &self,
        body: &OpenAiRequest,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response> {
        let request = self
            .client
            .post(self.completions_url())
            .bearer_auth(self.api_key())
            .header("Content-Type", "application/json")
            .json(body);

        let response = send_cancellable(request, cancel).await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let retry_after = parse_retry_after_seconds(response.headers());
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status, "OpenAI API error");
        Err(parse_error(status, &body, retry_after))
    }
}

/// Parse an error response body
fn parse_error(status: u16, body: &str, retry_after: Option<u64>) -> AssistError {
    let message = serde_json::from_str::<OpenAiError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());
    status_error(status, format!("OpenAI API error: {}", message), retry_after)
}

/// Extract the text delta from one SSE line. `None` for keep-alives, the
/// `[DONE]` sentinel, and lines that do not parse.
fn parse_stream_line(line: &str) -> Option<String> {
    let data = line.strip_prefix("data: ")?;
    if data == "[DONE]" {
        return None;
    }
    match serde_json::from_str::<OpenAiStreamChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .filter(|text| !text.is_empty()),
        Err(e) => {
            tracing::warn!(error = %e, "Error parsing streaming response");
            None
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        Self::models()
    }

    fn model(&self) -> String {
        match self.config.read() {
            Ok(config) => config.model.clone(),
            Err(poisoned) => poisoned.into_inner().model.clone(),
        }
    }

    fn set_model(&self, model: &str) -> Result<()> {
        let mut config = match self.config.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        config.select_model(model, &Self::models())
    }

    async fn validate_key(&self, api_key: &str) -> bool {
        let result = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(api_key)
            .send()
            .await;

        match result {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "OpenAI key validation request failed");
                false
            }
        }
    }

    async fn complete(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<String> {
        let body = self.build_request(&request, false);
        let response = self.post(&body, &cancel).await?;
        let parsed: OpenAiResponse = read_json_cancellable(response, &cancel).await?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }

    async fn complete_stream(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkStream> {
        let body = self.build_request(&request, true);
        let response = self.post(&body, &cancel).await?;
        let mut bytes = Box::pin(response.bytes_stream());

        Ok(Box::pin(async_stream::try_stream! {
            let mut lines = LineBuffer::default();

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(AssistError::RequestCancelled),
                    next = bytes.next() => Ok(next),
                }?;

                let Some(chunk) = next else { break };
                let chunk = chunk.map_err(|e| AssistError::Api(ApiError::StreamError(e.to_string())))?;

                for line in lines.push(&chunk) {
                    if let Some(text) = parse_stream_line(&line) {
                        yield text;
                    }
                }
            }

            if let Some(text) = lines.finish().as_deref().and_then(parse_stream_line) {
                yield text;
            }
        }))
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

impl From<&ChatTurn> for OpenAiMessage {
    fn from(turn: &ChatTurn) -> Self {
        Self {
            role: turn.role.as_str().to_string(),
            content: turn.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    #[serde(default)]
    delta: OpenAiDelta,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_new() {
        let provider = OpenAiProvider::new("sk-test").unwrap();
        assert_eq!(provider.api_key(), "sk-test");
        assert_eq!(provider.model(), "gpt-4o-mini");
        assert_eq!(provider.completions_url(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_provider_rejects_blank_key() {
        assert!(OpenAiProvider::new("  ").is_err());
    }

    #[test]
    fn test_with_base_url_trims_slash() {
        let provider = OpenAiProvider::with_base_url("sk-test", "http://localhost:9000/v1/").unwrap();
        assert_eq!(provider.completions_url(), "http://localhost:9000/v1/chat/completions");
    }

    #[test]
    fn test_set_model() {
        let provider = OpenAiProvider::new("sk-test").unwrap();
        provider.set_model("gpt-4o").unwrap();
        assert_eq!(provider.model(), "gpt-4o");

        let err = provider.set_model("gpt-2").unwrap_err();
        assert!(err.to_string().contains("Invalid model selected"));
        assert_eq!(provider.model(), "gpt-4o");
    }

    #[test]
    fn test_model_display_name() {
        let provider = OpenAiProvider::new("sk-test").unwrap();
        assert_eq!(provider.model_display_name("o3-mini"), "GPT-o3 Mini");
        assert_eq!(provider.model_display_name("custom"), "custom");
        assert!(provider.supports_model("o1"));
        assert!(!provider.supports_model("claude-3-5-sonnet-latest"));
    }

    #[test]
    fn test_build_request_puts_system_first() {
        let provider = OpenAiProvider::new("sk-test").unwrap();
        let request = CompletionRequest::new("gpt-4o", vec![ChatTurn::user("Hello")])
            .with_system("Be helpful");

        let built = provider.build_request(&request, true);
        assert_eq!(built.messages.len(), 2);
        assert_eq!(built.messages[0].role, "system");
        assert_eq!(built.messages[1].content, "Hello");
        assert_eq!(built.stream, Some(true));

        let json = serde_json::to_value(provider.build_request(&request, false)).unwrap();
        assert!(json.get("stream").is_none());
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_parse_stream_line() {
        assert_eq!(
            parse_stream_line(r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#).as_deref(),
            Some("Hel")
        );
        assert!(parse_stream_line("data: [DONE]").is_none());
        assert!(parse_stream_line(r#"data: {"choices":[{"delta":{}}]}"#).is_none());
        assert!(parse_stream_line("data: {not json").is_none());
        assert!(parse_stream_line(": keep-alive").is_none());
    }

    #[test]
    fn test_parse_error_uses_message() {
        let err = parse_error(
            500,
            r#"{"error": {"message": "The server had an error"}}"#,
            None,
        );
        assert!(err.to_string().contains("The server had an error"));
    }
}
