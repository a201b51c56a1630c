// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Multi-attempt whole-file rewrites
//!
//! The composer asks the provider for a complete replacement of the editor
//! content and hands back a preview. Nothing touches the editor until the
//! caller applies the preview, and an apply that introduces error markers is
//! rolled back to the original content.

mod preview;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::editor::{diagnostics, lock_editor, SharedEditor};
use crate::error::{AssistError, Result};
use crate::llm::provider::{IntegrationRequest, LlmProvider};

pub use preview::{ApplyReport, CompositionPreview, RevertReport};

/// Attempts made before giving up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

pub(crate) const STOPPED_MESSAGE: &str = "Process stopped by user.";

/// One pass through the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionAttempt {
    pub attempt_number: u32,
    pub original_content: String,
    pub proposed_content: Option<String>,
    pub stopped: bool,
}

/// Result of [`Composer::process_request`]
#[derive(Debug)]
pub enum ComposerOutcome {
    /// The provider proposed new content; nothing was applied yet
    PreviewReady(CompositionPreview),
    /// `stop()` was called; the editor holds the original content
    Stopped { message: String },
    /// Every attempt failed, or the editor was missing
    Failed { message: String, source: AssistError },
    /// A run was already in progress; this call did nothing
    Busy,
}

impl ComposerOutcome {
    /// One-line summary for display
    pub fn message(&self) -> &str {
        match self {
            ComposerOutcome::PreviewReady(_) => "Reviewing changes before applying...",
            ComposerOutcome::Stopped { message } | ComposerOutcome::Failed { message, .. } => {
                message
            }
            ComposerOutcome::Busy => "Already processing a request",
        }
    }
}

/// Clears the processing flag however the run ends
struct ProcessingGuard<'a> {
    processing: &'a AtomicBool,
    cancel: &'a Mutex<Option<CancellationToken>>,
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        *lock_token(self.cancel) = None;
        self.processing.store(false, Ordering::SeqCst);
    }
}

fn lock_token(
    cancel: &Mutex<Option<CancellationToken>>,
) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
    match cancel.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Whole-file rewrite orchestrator
pub struct Composer {
    editor: Option<SharedEditor>,
    provider: Arc<dyn LlmProvider>,
    max_attempts: u32,
    processing: AtomicBool,
    stop_requested: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
}

impl Composer {
    pub fn new(editor: Option<SharedEditor>, provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            editor,
            provider,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            processing: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            cancel: Mutex::new(None),
        }
    }

    /// Override the attempt budget (at least one attempt is always made)
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Ask the provider to rewrite the editor content according to
    /// `user_request`. A second call while one is running returns
    /// [`ComposerOutcome::Busy`] without doing anything.
    pub async fn process_request(&self, user_request: &str) -> ComposerOutcome {
        if self
            .processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("composer already processing a request");
            return ComposerOutcome::Busy;
        }

        let cancel = CancellationToken::new();
        *lock_token(&self.cancel) = Some(cancel.clone());
        self.stop_requested.store(false, Ordering::SeqCst);
        let _guard = ProcessingGuard {
            processing: &self.processing,
            cancel: &self.cancel,
        };

        match self.run(user_request, cancel).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error = %e, "composition failed");
                ComposerOutcome::Failed {
                    message: format!("Error during composition: {}", e),
                    source: e,
                }
            }
        }
    }

    async fn run(&self, user_request: &str, cancel: CancellationToken) -> Result<ComposerOutcome> {
        let editor = self.editor.clone().ok_or(AssistError::NoActiveEditor)?;

        let (original_content, file_extension, language_name, errors) = {
            let editor = lock_editor(&editor);
            (
                editor.content(),
                editor.file_extension(),
                editor.language_name(),
                diagnostics::errors_only(&editor.diagnostics()),
            )
        };

        tracing::debug!(
            file_extension = %file_extension,
            language = %language_name,
            max_attempts = self.max_attempts,
            "starting composition"
        );

        let mut last_error = None;
        let mut attempt_number = 0;

        while attempt_number < self.max_attempts && !self.stop_requested() {
            attempt_number += 1;
            let mut attempt = CompositionAttempt {
                attempt_number,
                original_content: original_content.clone(),
                proposed_content: None,
                stopped: false,
            };

            let request = IntegrationRequest {
                original_code: original_content.clone(),
                new_code: String::new(),
                user_prompt: user_request.to_string(),
                file_extension: file_extension.clone(),
                language_name: language_name.clone(),
                errors: errors.clone(),
            };

            let span = tracing::debug_span!("composition_attempt", attempt = attempt_number);
            match self
                .provider
                .integrate_code(request, cancel.clone())
                .instrument(span)
                .await
            {
                Ok(code) => {
                    if self.stop_requested() {
                        attempt.stopped = true;
                        tracing::debug!(attempt = attempt_number, "stopped after provider answered");
                        break;
                    }
                    attempt.proposed_content = Some(code.clone());
                    return Ok(ComposerOutcome::PreviewReady(CompositionPreview::new(
                        editor,
                        code,
                        original_content,
                        file_extension,
                        attempt,
                    )));
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt_number,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "composition attempt failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        if self.stop_requested() {
            restore_if_changed(&editor, &original_content);
            return Ok(ComposerOutcome::Stopped {
                message: STOPPED_MESSAGE.to_string(),
            });
        }

        Err(last_error.unwrap_or_else(|| {
            AssistError::InvalidInput("no composition attempt was made".to_string())
        }))
    }

    /// Request a stop and cancel the in-flight provider call. Safe when idle.
    pub fn stop(&self) {
        if !self.is_processing() {
            return;
        }
        tracing::debug!("stopping composition");
        self.stop_requested.store(true, Ordering::SeqCst);
        if let Some(cancel) = lock_token(&self.cancel).as_ref() {
            cancel.cancel();
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }
}

/// Put `original` back unless the editor already holds it
fn restore_if_changed(editor: &SharedEditor, original: &str) {
    let mut editor = lock_editor(editor);
    if editor.content() == original {
        return;
    }
    if let Err(e) = preview::replace_as_unit(&mut *editor, original) {
        tracing::warn!(error = %e, "failed to restore original content");
    }
}
