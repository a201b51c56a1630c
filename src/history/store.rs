// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat history store
//!
//! Holds the ordered conversation shared by every provider instance. The
//! store is a cheap handle: clones share the same underlying turns, so a
//! session and the provider serving it always see one history.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::llm::message::ChatTurn;

/// Default number of middle turns kept by truncation
pub const DEFAULT_MAX_RECORDS: usize = 6;

/// Ordered, shared chat history with anchored sliding-window truncation
#[derive(Debug, Clone)]
pub struct ChatHistoryStore {
    turns: Arc<Mutex<Vec<ChatTurn>>>,
    max_records: usize,
}

impl Default for ChatHistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECORDS)
    }
}

impl ChatHistoryStore {
    /// Create an empty store that truncates to `max_records` middle turns
    pub fn new(max_records: usize) -> Self {
        Self {
            turns: Arc::new(Mutex::new(Vec::new())),
            max_records,
        }
    }

    /// Configured truncation bound
    pub fn max_records(&self) -> usize {
        self.max_records
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ChatTurn>> {
        match self.turns.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Chat history lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Append a turn at the end of the conversation
    pub fn append(&self, turn: ChatTurn) {
        self.lock().push(turn);
    }

    /// Snapshot of all turns in conversation order
    pub fn all(&self) -> Vec<ChatTurn> {
        self.lock().clone()
    }

    /// Number of stored turns
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the history is empty
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every turn
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Keep the first turn, the `max_records` turns before the last one, and
    /// the last turn. No-op while `len <= max_records + 1`.
    pub fn truncate(&self, max_records: usize) {
        let mut turns = self.lock();
        let truncated = truncate_turns(max_records, &turns);
        if truncated.len() != turns.len() {
            tracing::debug!(
                before = turns.len(),
                after = truncated.len(),
                "truncated chat history"
            );
            *turns = truncated;
        }
    }
}

/// Anchored sliding window over a conversation.
///
/// Result is `[turns[0], turns[max(1, len-max-1)..len-1], turns[len-1]]` when
/// `len > max + 1`, otherwise the input unchanged.
pub fn truncate_turns(max_records: usize, turns: &[ChatTurn]) -> Vec<ChatTurn> {
    let len = turns.len();
    if len <= max_records + 1 {
        return turns.to_vec();
    }

    let start = (len - max_records - 1).max(1);
    let mut result = Vec::with_capacity(max_records + 2);
    result.push(turns[0].clone());
    result.extend_from_slice(&turns[start..len - 1]);
    result.push(turns[len - 1].clone());
    result
}
