// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LLM provider implementations

pub mod anthropic;
pub mod common;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use common::strip_code_fences;
pub use openai::OpenAiProvider;
