// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat session management
//!
//! A [`ChatSession`] sends prompts over a shared [`crate::history::ChatHistoryStore`]
//! and hands the reply back as a stream. The attachment helpers shape what the
//! user sends and split what comes back.

mod attachments;
mod session;

pub use attachments::{
    compose_message, compose_request, extract_code_blocks, is_simple_question, CodeAttachment,
    ReplySegment,
};
pub use session::{collect, error_message, ChatSession, ChatSessionBuilder, RequestSlot};
