// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Proposed rewrite awaiting confirmation

use crate::editor::{diagnostics, lock_editor, EditorHost, LineError, SharedEditor};
use crate::error::Result;

use super::CompositionAttempt;

const EDIT_SOURCE: &str = "composer";

/// Outcome of [`CompositionPreview::apply`] and [`CompositionPreview::reapply`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    pub success: bool,
    pub message: String,
    /// Error markers that caused a rollback
    pub errors: Vec<LineError>,
}

/// Outcome of [`CompositionPreview::revert`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevertReport {
    pub success: bool,
    pub message: String,
    pub can_reapply: bool,
}

/// A rewrite the provider proposed. Holds both versions so the caller can
/// apply, revert and reapply.
pub struct CompositionPreview {
    editor: SharedEditor,
    code: String,
    original_code: String,
    language: String,
    attempt: CompositionAttempt,
}

impl std::fmt::Debug for CompositionPreview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositionPreview")
            .field("code", &self.code)
            .field("original_code", &self.original_code)
            .field("language", &self.language)
            .field("attempt", &self.attempt.attempt_number)
            .finish()
    }
}

impl CompositionPreview {
    pub(crate) fn new(
        editor: SharedEditor,
        code: String,
        original_code: String,
        language: String,
        attempt: CompositionAttempt,
    ) -> Self {
        Self {
            editor,
            code,
            original_code,
            language,
            attempt,
        }
    }

    /// Proposed content
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Content at the time the request was made
    pub fn original_code(&self) -> &str {
        &self.original_code
    }

    /// File extension the rewrite targets
    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn attempt(&self) -> &CompositionAttempt {
        &self.attempt
    }

    /// Replace the editor content with the proposal as one undoable unit.
    ///
    /// If the new content carries error markers the original is put back and
    /// the report lists them. A rejected edit restores the original and
    /// returns the error. The replacement, the check and any rollback share
    /// one undo unit, so undoing after a rollback never brings the proposal
    /// back.
    pub fn apply(&self) -> Result<ApplyReport> {
        let mut editor = lock_editor(&self.editor);
        editor.push_undo_stop();
        let report = self.apply_within_unit(&mut *editor);
        editor.push_undo_stop();
        report
    }

    fn apply_within_unit(&self, editor: &mut dyn EditorHost) -> Result<ApplyReport> {
        editor.replace_all(&self.code, EDIT_SOURCE).inspect_err(|e| {
            tracing::warn!(error = %e, "failed to apply composition");
            restore(editor, &self.original_code);
        })?;

        let errors = diagnostics::errors_only(&editor.diagnostics());
        if errors.is_empty() {
            tracing::debug!(attempt = self.attempt.attempt_number, "composition applied");
            return Ok(ApplyReport {
                success: true,
                message: "No errors detected, changes applied successfully.".to_string(),
                errors,
            });
        }

        tracing::debug!(count = errors.len(), "composition introduced errors, rolling back");
        restore(editor, &self.original_code);
        Ok(ApplyReport {
            success: false,
            message: "Failed to apply changes. Errors were found in the code.".to_string(),
            errors,
        })
    }

    /// Put the original content back
    pub fn revert(&self) -> RevertReport {
        let mut editor = lock_editor(&self.editor);
        match replace_as_unit(&mut *editor, &self.original_code) {
            Ok(()) => RevertReport {
                success: true,
                message: "Changes reverted successfully.".to_string(),
                can_reapply: true,
            },
            Err(e) => RevertReport {
                success: false,
                message: format!("Error reverting changes: {}", e),
                can_reapply: false,
            },
        }
    }

    /// Put the proposal back after a revert. No error check is made.
    pub fn reapply(&self) -> ApplyReport {
        let mut editor = lock_editor(&self.editor);
        match replace_as_unit(&mut *editor, &self.code) {
            Ok(()) => ApplyReport {
                success: true,
                message: "Changes reapplied successfully.".to_string(),
                errors: Vec::new(),
            },
            Err(e) => ApplyReport {
                success: false,
                message: format!("Error reapplying changes: {}", e),
                errors: Vec::new(),
            },
        }
    }
}

/// Whole-buffer replacement bracketed by undo stops
pub(crate) fn replace_as_unit(editor: &mut dyn EditorHost, text: &str) -> Result<()> {
    editor.push_undo_stop();
    let result = editor.replace_all(text, EDIT_SOURCE);
    editor.push_undo_stop();
    result
}

/// Put `original` back inside the unit in progress
fn restore(editor: &mut dyn EditorHost, original: &str) {
    if let Err(e) = editor.replace_all(original, EDIT_SOURCE) {
        tracing::warn!(error = %e, "failed to restore original content");
    }
}
