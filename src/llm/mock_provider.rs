// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Mock LLM provider for testing
//!
//! Provides a configurable mock implementation of the LlmProvider trait
//! that can be used in unit tests without making real API calls.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{ApiError, AssistError, Result};
use crate::llm::provider::{ChunkStream, CompletionRequest, LlmProvider, ModelInfo};

/// A mock LLM provider for testing
#[derive(Clone)]
pub struct MockProvider {
    /// Provider name
    name: String,
    /// Configured responses
    responses: Arc<Mutex<Vec<MockResponse>>>,
    /// Call counter
    call_count: Arc<AtomicUsize>,
    /// Recorded requests
    recorded_requests: Arc<Mutex<Vec<CompletionRequest>>>,
    /// Available models
    models: Vec<ModelInfo>,
    /// Selected model
    model: Arc<RwLock<String>>,
    /// The only key `validate_key` accepts; any non-blank key when unset
    valid_key: Option<String>,
    /// Simulated latency before answering
    delay: Option<Duration>,
}

/// A pre-configured response for the mock provider
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Answer with this text (streamed in 10-character chunks)
    Text(String),
    /// Stream exactly these chunks
    Chunks(Vec<String>),
    /// Fail with an HTTP status
    Status { status: u16, message: String },
    /// Fail before reaching the server
    Network(String),
    /// Never answer; resolves only through cancellation
    Pending,
}

impl MockResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::Status {
            status: 500,
            message: message.into(),
        }
    }
}

impl Default for MockResponse {
    fn default() -> Self {
        Self::Text("Mock response".to_string())
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Create a new mock provider
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            responses: Arc::new(Mutex::new(vec![MockResponse::default()])),
            call_count: Arc::new(AtomicUsize::new(0)),
            recorded_requests: Arc::new(Mutex::new(vec![])),
            models: vec![Self::default_model()],
            model: Arc::new(RwLock::new("mock-model".to_string())),
            valid_key: None,
            delay: None,
        }
    }

    /// Create a mock provider with a custom name
    pub fn with_name(name: impl Into<String>) -> Self {
        let mut provider = Self::new();
        provider.name = name.into();
        provider
    }

    /// Create a default model info
    fn default_model() -> ModelInfo {
        ModelInfo::new("mock-model", "Mock Model", "Scripted responses")
    }

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        match mutex.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Mock provider lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Set the text response
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.with_script(vec![MockResponse::Text(text.into())])
    }

    /// Queue multiple text responses (returned in order)
    pub fn with_responses(self, texts: Vec<String>) -> Self {
        self.with_script(texts.into_iter().map(MockResponse::Text).collect())
    }

    /// Queue arbitrary outcomes (returned in order, the last one repeats)
    pub fn with_script(self, script: Vec<MockResponse>) -> Self {
        {
            let mut responses = Self::lock(&self.responses);
            responses.clear();
            responses.extend(script);
        }
        self
    }

    /// Add custom models; the first becomes the selected model
    pub fn with_models(mut self, models: Vec<ModelInfo>) -> Self {
        if let Some(first) = models.first() {
            self.model = Arc::new(RwLock::new(first.id.clone()));
        }
        self.models = models;
        self
    }

    /// Only accept this key in `validate_key`
    pub fn with_valid_key(mut self, key: impl Into<String>) -> Self {
        self.valid_key = Some(key.into());
        self
    }

    /// Wait this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get the number of times complete() or complete_stream() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Get all recorded requests
    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        Self::lock(&self.recorded_requests).clone()
    }

    /// Get the last request made
    pub fn last_request(&self) -> Option<CompletionRequest> {
        Self::lock(&self.recorded_requests).last().cloned()
    }

    /// Reset call count and recorded requests
    pub fn reset(&self) {
        self.call_count.store(0, Ordering::SeqCst);
        Self::lock(&self.recorded_requests).clear();
    }

    /// Record the request and pick the scripted response for this call
    fn next_response(&self, request: &CompletionRequest) -> MockResponse {
        Self::lock(&self.recorded_requests).push(request.clone());
        let count = self.call_count.fetch_add(1, Ordering::SeqCst);
        let responses = Self::lock(&self.responses);
        if responses.is_empty() {
            MockResponse::default()
        } else {
            responses[count.min(responses.len() - 1)].clone()
        }
    }

    /// Resolve a scripted response into its chunks, honoring delay and cancellation
    async fn resolve(
        &self,
        response: MockResponse,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        if let Some(delay) = self.delay {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AssistError::RequestCancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        if cancel.is_cancelled() {
            return Err(AssistError::RequestCancelled);
        }

        match response {
            MockResponse::Text(text) => Ok(text
                .chars()
                .collect::<Vec<_>>()
                .chunks(10)
                .map(|chunk| chunk.iter().collect())
                .collect()),
            MockResponse::Chunks(chunks) => Ok(chunks),
            MockResponse::Status { status, message } => {
                Err(AssistError::Api(ApiError::ServerError { status, message }))
            }
            MockResponse::Network(message) => Err(AssistError::Api(ApiError::Network(message))),
            MockResponse::Pending => {
                cancel.cancelled().await;
                Err(AssistError::RequestCancelled)
            }
        }
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        self.models.clone()
    }

    fn model(&self) -> String {
        match self.model.read() {
            Ok(model) => model.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_model(&self, model: &str) -> Result<()> {
        if !self.supports_model(model) {
            return Err(AssistError::InvalidInput("Invalid model selected".to_string()));
        }
        let mut selected = match self.model.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *selected = model.to_string();
        Ok(())
    }

    async fn validate_key(&self, api_key: &str) -> bool {
        match &self.valid_key {
            Some(valid) => valid == api_key,
            None => !api_key.trim().is_empty(),
        }
    }

    async fn complete(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<String> {
        let response = self.next_response(&request);
        Ok(self.resolve(response, &cancel).await?.concat())
    }

    async fn complete_stream(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkStream> {
        let response = self.next_response(&request);
        let chunks = self.resolve(response, &cancel).await?;

        // Cancellation is re-checked between chunks like a real stream read
        Ok(Box::pin(async_stream::try_stream! {
            for chunk in chunks {
                if cancel.is_cancelled() {
                    Err::<(), _>(AssistError::RequestCancelled)?;
                }
                yield chunk;
                tokio::task::yield_now().await;
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::ChatHistoryStore;
    use crate::llm::message::{ChatTurn, Role};
    use futures::StreamExt;

    #[test]
    fn test_mock_provider_creation() {
        let provider = MockProvider::new();
        assert_eq!(provider.name(), "mock");
        assert_eq!(provider.call_count(), 0);
        assert_eq!(provider.model(), "mock-model");
    }

    #[test]
    fn test_mock_provider_with_name() {
        let provider = MockProvider::with_name("test-provider");
        assert_eq!(provider.name(), "test-provider");
    }

    #[test]
    fn test_mock_provider_with_custom_models() {
        let provider = MockProvider::new().with_models(vec![
            ModelInfo::new("custom-a", "A", ""),
            ModelInfo::new("custom-b", "B", ""),
        ]);
        assert_eq!(provider.model(), "custom-a");
        provider.set_model("custom-b").unwrap();
        assert_eq!(provider.model(), "custom-b");
        assert!(provider.set_model("mock-model").is_err());
    }

    #[tokio::test]
    async fn test_mock_provider_complete() {
        let provider = MockProvider::new().with_response("Test response");
        let request = CompletionRequest::new("mock-model", vec![ChatTurn::user("Hello")]);

        let text = provider
            .complete(request, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(text, "Test response");
        assert_eq!(provider.call_count(), 1);
        assert_eq!(provider.last_request().unwrap().messages[0].content, "Hello");
    }

    #[tokio::test]
    async fn test_mock_provider_script_repeats_last() {
        let provider = MockProvider::new().with_script(vec![
            MockResponse::server_error("boom"),
            MockResponse::text("ok"),
        ]);
        let request = CompletionRequest::new("mock-model", vec![]);

        let first = provider.complete(request.clone(), CancellationToken::new()).await;
        assert!(matches!(
            first,
            Err(AssistError::Api(ApiError::ServerError { status: 500, .. }))
        ));
        for _ in 0..2 {
            let text = provider
                .complete(request.clone(), CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(text, "ok");
        }
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_provider_stream_chunks() {
        let provider = MockProvider::new().with_response("Hello, streaming world");
        let request = CompletionRequest::new("mock-model", vec![]);

        let stream = provider
            .complete_stream(request, CancellationToken::new())
            .await
            .unwrap();
        let chunks: Vec<String> = stream.map(|c| c.unwrap()).collect().await;

        assert_eq!(chunks, vec!["Hello, str", "eaming wor", "ld"]);
    }

    #[tokio::test]
    async fn test_mock_provider_pending_until_cancelled() {
        let provider = MockProvider::new().with_script(vec![MockResponse::Pending]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let result = provider
            .complete(CompletionRequest::new("mock-model", vec![]), cancel)
            .await;
        assert!(matches!(result, Err(AssistError::RequestCancelled)));
    }

    #[tokio::test]
    async fn test_mock_provider_validate_key() {
        let open = MockProvider::new();
        assert!(open.validate_key("anything").await);
        assert!(!open.validate_key(" ").await);

        let strict = MockProvider::new().with_valid_key("sk-good");
        assert!(strict.validate_key("sk-good").await);
        assert!(!strict.validate_key("sk-bad").await);
    }

    #[tokio::test]
    async fn test_chat_records_turns_after_stream_ends() {
        let provider = MockProvider::new().with_response("Hi there");
        let history = ChatHistoryStore::default();

        let stream = provider
            .chat("Hello", &history, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(history.len(), 1);

        let chunks: Vec<String> = stream.map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks.concat(), "Hi there");

        let turns = history.all();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].content, "Hi there");
    }
}
