// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Comment-driven inline suggestions
//!
//! [`SuggestionEngine`] decides when to ask the provider for a completion and
//! shows the answer as ghost text in reserved lines below the cursor.
//! [`driver::run_suggestion_loop`] runs it against a live event stream.

pub mod comment;
pub mod driver;
pub mod engine;
pub mod indent;

pub use driver::{run_suggestion_loop, KeyOutcome};
pub use engine::{
    EngineState, SuggestionEngine, SuggestionReply, SuggestionRequest, SuggestionState,
    GHOST_TEXT_CLASS,
};
pub use indent::IndentContext;
