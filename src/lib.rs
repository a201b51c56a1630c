// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! codeassist - request orchestration for an AI coding assistant.
//!
//! This crate exposes the shared runtime used by:
//! - the `codeassist` CLI (`src/main.rs`)
//! - editor hosts that embed the chat, composer, bug finder and inline
//!   suggestion components behind the [`editor::EditorHost`] trait
//!
//! Architecture highlights:
//! - `llm`: provider abstraction and the OpenAI/Anthropic clients
//! - `history`: bounded conversation history shared across providers
//! - `chat`: chat sessions, attachments and reply segmentation
//! - `composer`, `bugfinder`: whole-file rewrites with preview/apply/revert
//! - `autocomplete`: comment-driven ghost-text suggestions
//! - `editor`: the editor collaborator and an in-memory buffer

pub mod autocomplete;
pub mod bugfinder;
pub mod chat;
pub mod cli;
pub mod composer;
pub mod config;
pub mod editor;
pub mod error;
pub mod history;
pub mod llm;

pub use error::{AssistError, Result};
