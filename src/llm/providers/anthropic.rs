// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Anthropic Claude API provider implementation
//!
//! Chat replies are answered in one response and surfaced as a single-chunk
//! stream unless the provider is built with [`AnthropicProvider::with_streaming`].

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::{ApiError, AssistError, Result};
use crate::llm::message::{ChatTurn, Role};
use crate::llm::provider::{ChunkStream, CompletionRequest, LlmProvider, ModelInfo, ProviderConfig};
use crate::llm::providers::common::{
    parse_retry_after_seconds, read_json_cancellable, send_cancellable, server_error,
    status_error, EventBuffer,
};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const ANTHROPIC_DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";

/// Anthropic Claude provider
pub struct AnthropicProvider {
    client: Client,
    config: RwLock<ProviderConfig>,
    base_url: String,
    streaming: bool,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider using the default model
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, ANTHROPIC_API_URL)
    }

    /// Create with a custom messages endpoint
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let config = ProviderConfig::new(api_key, ANTHROPIC_DEFAULT_MODEL, &Self::models())?;
        Ok(Self {
            client: Client::new(),
            config: RwLock::new(config),
            base_url: base_url.into(),
            streaming: false,
        })
    }

    /// Stream chat replies as server-sent events
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Static model catalogue
    pub fn models() -> Vec<ModelInfo> {
        vec![
            ModelInfo::new(
                "claude-3-5-sonnet-latest",
                "Claude 3.5 Sonnet",
                "Most capable Claude model, best for complex tasks",
            ),
            ModelInfo::new(
                "claude-3-5-haiku-latest",
                "Claude 3.5 Haiku",
                "Faster and more cost-effective than Sonnet",
            ),
        ]
    }

    fn api_key(&self) -> String {
        match self.config.read() {
            Ok(config) => config.api_key.clone(),
            Err(poisoned) => poisoned.into_inner().api_key.clone(),
        }
    }

    /// Convert turns to Anthropic format. System turns travel in the
    /// top-level `system` field instead.
    fn convert_messages(&self, messages: &[ChatTurn]) -> Vec<AnthropicMessage> {
        messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| AnthropicMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect()
    }

    /// Build the request body
    fn build_request(&self, request: &CompletionRequest, stream: bool) -> AnthropicRequest {
        AnthropicRequest {
            model: request.model.clone(),
            messages: self.convert_messages(&request.messages),
            system: request.system.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: stream.then_some(true),
        }
    }

    fn post_builder(&self, api_key: &str) -> reqwest::RequestBuilder {
        self.client
            .post(&self.base_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
    }

    async fn post(
        &self,
        body: &AnthropicRequest,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response> {
        let request = self.post_builder(&self.api_key()).json(body);
        let response = send_cancellable(request, cancel).await?;
        if response.status().is_success() {
            return Ok(response);
        }

        // Extract Retry-After header before consuming response body
        let status = response.status().as_u16();
        let retry_after = parse_retry_after_seconds(response.headers());
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status, "Anthropic API error");
        Err(parse_error(status, &body, retry_after))
    }

    async fn stream_events(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkStream> {
        let body = self.build_request(&request, true);
        let response = self.post(&body, &cancel).await?;
        let mut bytes = Box::pin(response.bytes_stream());

        Ok(Box::pin(async_stream::try_stream! {
            let mut events = EventBuffer::default();

            'read: loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(AssistError::RequestCancelled),
                    next = bytes.next() => Ok(next),
                }?;

                // A final event may arrive without its blank-line terminator
                let (batch, ended) = match next {
                    Some(chunk) => {
                        let chunk = chunk
                            .map_err(|e| AssistError::Api(ApiError::StreamError(e.to_string())))?;
                        (events.push(&chunk), false)
                    }
                    None => (std::mem::take(&mut events).finish().into_iter().collect(), true),
                };

                for event_str in batch {
                    match parse_sse_event(&event_str) {
                        Some(SseEvent::Text(text)) => yield text,
                        Some(SseEvent::Stop) => break 'read,
                        Some(SseEvent::Error(message)) => {
                            Err::<(), _>(AssistError::Api(ApiError::StreamError(message)))?;
                        }
                        None => {}
                    }
                }

                if ended {
                    break;
                }
            }
        }))
    }
}

/// Parse an error response
fn parse_error(status: u16, body: &str, retry_after: Option<u64>) -> AssistError {
    match serde_json::from_str::<AnthropicError>(body) {
        Ok(error_response) => match error_response.error.error_type.as_str() {
            "authentication_error" => AssistError::Api(ApiError::AuthenticationFailed),
            "rate_limit_error" => {
                AssistError::Api(ApiError::RateLimited(retry_after.unwrap_or(10) as u32))
            }
            _ => server_error(
                status,
                format!("Anthropic API error: {}", error_response.error.message),
            ),
        },
        Err(_) => status_error(status, format!("Anthropic API error: {}", body), retry_after),
    }
}

enum SseEvent {
    Text(String),
    Stop,
    Error(String),
}

/// Parse a Server-Sent Event, keeping only what a text reply needs
fn parse_sse_event(event_str: &str) -> Option<SseEvent> {
    let mut event_type = None;
    let mut data = None;

    for line in event_str.lines() {
        if let Some(rest) = line.strip_prefix("event: ") {
            event_type = Some(rest.to_string());
        } else if let Some(rest) = line.strip_prefix("data: ") {
            data = Some(rest.to_string());
        }
    }

    match event_type?.as_str() {
        "content_block_delta" => {
            let parsed: serde_json::Value = serde_json::from_str(&data?).ok()?;
            let delta = &parsed["delta"];
            match delta["type"].as_str()? {
                "text_delta" => Some(SseEvent::Text(delta["text"].as_str()?.to_string())),
                _ => None,
            }
        }
        "message_stop" => Some(SseEvent::Stop),
        "error" => {
            let parsed: serde_json::Value = serde_json::from_str(&data?).ok()?;
            Some(SseEvent::Error(
                parsed["error"]["message"].as_str()?.to_string(),
            ))
        }
        _ => None,
    }
}

/// First text block of a messages response
fn first_text(response: AnthropicResponse) -> Option<String> {
    response.content.into_iter().find_map(|block| match block {
        AnthropicContentBlock::Text { text } => Some(text),
        AnthropicContentBlock::Other => None,
    })
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
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
        let body = self.build_request(
            &CompletionRequest::new(self.model(), vec![ChatTurn::user("Hello, world")]),
            false,
        );

        let response = match self.post_builder(api_key).json(&body).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(error = %e, "Anthropic key validation request failed");
                return false;
            }
        };

        if !response.status().is_success() {
            tracing::debug!(status = response.status().as_u16(), "Anthropic key rejected");
            return false;
        }

        match response.json::<AnthropicResponse>().await {
            Ok(parsed) => first_text(parsed).is_some(),
            Err(_) => false,
        }
    }

    async fn complete(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<String> {
        let body = self.build_request(&request, false);
        let response = self.post(&body, &cancel).await?;
        let parsed: AnthropicResponse = read_json_cancellable(response, &cancel).await?;
        Ok(first_text(parsed).unwrap_or_default())
    }

    async fn complete_stream(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkStream> {
        if self.streaming {
            return self.stream_events(request, cancel).await;
        }

        let content = self.complete(request, cancel).await?;
        Ok(Box::pin(futures::stream::once(async move { Ok(content) })))
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}
