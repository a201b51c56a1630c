// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::sync::OnceLock;

use regex::Regex;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{RequestBuilder, Response};
use tokio_util::sync::CancellationToken;

use crate::error::{ApiError, AssistError, Result};

/// Remove markdown code-fence wrapping and surrounding whitespace.
///
/// Matches every opening fence with its optional language tag and a closing
/// fence at the very end of the text.
pub fn strip_code_fences(content: &str) -> String {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| Regex::new(r"```\w*\n?|\n```$").expect("valid fence regex"));
    fence.replace_all(content, "").trim().to_string()
}

/// Send a request, racing it against `cancel`.
pub(crate) async fn send_cancellable(
    request: RequestBuilder,
    cancel: &CancellationToken,
) -> Result<Response> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AssistError::RequestCancelled),
        response = request.send() => {
            response.map_err(|e| AssistError::Api(ApiError::Network(e.to_string())))
        }
    }
}

/// Read the full body as JSON, racing it against `cancel`.
pub(crate) async fn read_json_cancellable<T: serde::de::DeserializeOwned>(
    response: Response,
    cancel: &CancellationToken,
) -> Result<T> {
    let body = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(AssistError::RequestCancelled),
        body = response.text() => {
            body.map_err(|e| AssistError::Api(ApiError::Network(e.to_string())))?
        }
    };
    serde_json::from_str(&body).map_err(|e| AssistError::Api(ApiError::InvalidResponse(e.to_string())))
}

/// Parse numeric Retry-After header (seconds).
pub(crate) fn parse_retry_after_seconds(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
}

/// Construct a standardized server error.
pub(crate) fn server_error(status: u16, message: impl Into<String>) -> AssistError {
    AssistError::Api(ApiError::ServerError {
        status,
        message: message.into(),
    })
}

/// Map a non-2xx status into the error taxonomy. `message` is the best
/// human-readable text extracted from the body.
pub(crate) fn status_error(status: u16, message: String, retry_after: Option<u64>) -> AssistError {
    match status {
        401 | 403 => AssistError::Api(ApiError::AuthenticationFailed),
        429 => AssistError::Api(ApiError::RateLimited(retry_after.unwrap_or(10) as u32)),
        _ => server_error(status, message),
    }
}

/// Incremental splitter for line-oriented SSE bodies. Chunks may end mid-line
/// or mid-character; the raw tail stays buffered until the next chunk, so
/// only complete lines are decoded.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..pos]);
            lines.push(line.trim_end_matches('\r').to_string());
        }
        lines
    }

    /// Whatever remains after the body ended without a trailing newline
    pub(crate) fn finish(self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.buffer).trim().to_string();
        (!rest.is_empty()).then_some(rest)
    }
}

/// Groups SSE lines into events separated by a blank line. LF and CRLF
/// framing both work since lines come from [`LineBuffer`].
#[derive(Debug, Default)]
pub(crate) struct EventBuffer {
    lines: LineBuffer,
    pending: Vec<String>,
}

impl EventBuffer {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut events = Vec::new();
        for line in self.lines.push(bytes) {
            if line.is_empty() {
                if !self.pending.is_empty() {
                    events.push(self.pending.join("\n"));
                    self.pending.clear();
                }
            } else {
                self.pending.push(line);
            }
        }
        events
    }

    /// Event left open when the body ended without a blank line
    pub(crate) fn finish(mut self) -> Option<String> {
        if let Some(tail) = self.lines.finish() {
            self.pending.push(tail);
        }
        (!self.pending.is_empty()).then(|| self.pending.join("\n"))
    }
}
