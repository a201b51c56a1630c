// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for codeassist
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Main error type for codeassist operations
#[derive(Error, Debug)]
pub enum AssistError {
    /// Key validation returned false for the named provider
    #[error("Invalid API key for {0}")]
    InvalidApiKey(String),

    /// The caller cancelled the request through its cancellation token
    #[error("Request was cancelled")]
    RequestCancelled,

    /// API-related errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Bug analysis content was not the expected JSON shape
    #[error("Invalid response format from bug analysis: {0}")]
    InvalidResponseFormat(String),

    /// No editor is attached to the component
    #[error("No active editor found")]
    NoActiveEditor,

    /// The editor rejected an edit
    #[error("Editor error: {0}")]
    Editor(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// API-specific error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Authentication failed (invalid API key)
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    /// Rate limited by the API
    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u32),

    /// Network connectivity error
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid response from API
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// API returned a non-2xx status
    #[error("API error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Streaming error
    #[error("Streaming error: {0}")]
    StreamError(String),
}

/// Result type alias for codeassist operations
pub type Result<T> = std::result::Result<T, AssistError>;

impl AssistError {
    /// Whether this error is a cooperative cancellation. Callers treat it as a
    /// quiet stop rather than a failure to report.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AssistError::RequestCancelled)
    }

    /// Whether the provider answered with a non-2xx status.
    pub fn is_http_status(&self) -> bool {
        matches!(
            self,
            AssistError::Api(
                ApiError::ServerError { .. }
                    | ApiError::AuthenticationFailed
                    | ApiError::RateLimited(_)
            )
        )
    }
}
