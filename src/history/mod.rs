// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation history shared across providers

mod store;

pub use store::{truncate_turns, ChatHistoryStore, DEFAULT_MAX_RECORDS};
