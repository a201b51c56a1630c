// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat session management
//!
//! A session pairs a provider with the history it talks over. It does not
//! track requests in flight: the caller owns the cancellation token and
//! cancels the previous one before sending again ([`RequestSlot`] helps).

use std::sync::{Arc, Mutex};

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::error::{AssistError, Result};
use crate::history::ChatHistoryStore;
use crate::llm::message::ChatTurn;
use crate::llm::provider::{ChunkStream, LlmProvider};

/// Turns prompts into provider requests over a shared history
pub struct ChatSession {
    provider: Arc<dyn LlmProvider>,
    history: ChatHistoryStore,
}

impl ChatSession {
    pub fn new(provider: Arc<dyn LlmProvider>, history: ChatHistoryStore) -> Self {
        Self { provider, history }
    }

    /// Start a builder
    pub fn builder(provider: Arc<dyn LlmProvider>) -> ChatSessionBuilder {
        ChatSessionBuilder::new(provider)
    }

    /// Send `prompt` and return the reply as a lazy chunk sequence.
    ///
    /// The user turn is recorded immediately, even if the request then fails.
    /// The assistant turn is recorded once the stream is read to its end.
    pub async fn send(&self, prompt: &str, cancel: CancellationToken) -> Result<ChunkStream> {
        tracing::debug!(
            provider = self.provider.name(),
            model = %self.provider.model(),
            history = self.history.len(),
            "sending chat message"
        );
        self.provider.chat(prompt, &self.history, cancel).await
    }

    /// Send and read the whole reply
    pub async fn send_and_collect(&self, prompt: &str, cancel: CancellationToken) -> Result<String> {
        let stream = self.send(prompt, cancel).await?;
        collect(stream).await
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    /// Shared history handle
    pub fn history(&self) -> &ChatHistoryStore {
        &self.history
    }

    /// Snapshot of the conversation so far
    pub fn turns(&self) -> Vec<ChatTurn> {
        self.history.all()
    }

    pub fn clear_history(&self) {
        self.history.clear();
    }
}

/// Join every chunk of `stream` into one string
pub async fn collect(mut stream: ChunkStream) -> Result<String> {
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        text.push_str(&chunk?);
    }
    Ok(text)
}

/// Builder for [`ChatSession`]
pub struct ChatSessionBuilder {
    provider: Arc<dyn LlmProvider>,
    history: Option<ChatHistoryStore>,
    max_records: usize,
}

impl ChatSessionBuilder {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            history: None,
            max_records: crate::history::DEFAULT_MAX_RECORDS,
        }
    }

    /// Share an existing history instead of starting a new one
    pub fn with_history(mut self, history: ChatHistoryStore) -> Self {
        self.history = Some(history);
        self
    }

    /// Truncation bound for a new history
    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records;
        self
    }

    /// Take the truncation bound from settings
    pub fn with_settings(self, settings: &Settings) -> Self {
        self.with_max_records(settings.chat.max_history_records)
    }

    pub fn build(self) -> ChatSession {
        let history = self
            .history
            .unwrap_or_else(|| ChatHistoryStore::new(self.max_records));
        ChatSession::new(self.provider, history)
    }
}

/// Holds the token of the latest request so a new send can cancel the one
/// before it
#[derive(Debug, Default)]
pub struct RequestSlot {
    current: Mutex<Option<CancellationToken>>,
}

impl RequestSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the previous request and hand out a token for the next one
    pub fn renew(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut current = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = current.replace(token.clone()) {
            previous.cancel();
        }
        token
    }

    /// Cancel the current request, if any
    pub fn cancel(&self) {
        let current = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(token) = current.as_ref() {
            token.cancel();
        }
    }
}

/// User-facing line for a failed send. Cancellations produce nothing.
pub fn error_message(error: &AssistError) -> Option<String> {
    if error.is_cancelled() {
        None
    } else {
        Some(format!("Error: {}", error))
    }
}
