// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Single-shot bug analysis of the editor content

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;

use crate::editor::{lock_editor, SharedEditor};
use crate::error::{AssistError, Result};
use crate::llm::provider::{BugAnalysisRequest, LlmProvider};

/// Result of [`BugFinder::find_bugs`]
#[derive(Debug)]
pub enum BugFinderOutcome {
    NoBugs { message: String },
    BugsFound(BugFixPreview),
    Failed { message: String, source: AssistError },
    /// An analysis was already running
    Busy,
}

/// Proposed fix for the bugs the provider found
pub struct BugFixPreview {
    editor: SharedEditor,
    explanation: String,
    code: String,
    original_code: String,
    language: String,
}

impl std::fmt::Debug for BugFixPreview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BugFixPreview")
            .field("explanation", &self.explanation)
            .field("code", &self.code)
            .field("language", &self.language)
            .finish()
    }
}

impl BugFixPreview {
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn original_code(&self) -> &str {
        &self.original_code
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Replace the editor content with the fixed code as one undoable unit.
    /// A rejected edit puts the original back and returns the error.
    pub fn apply(&self) -> Result<String> {
        let mut editor = lock_editor(&self.editor);
        editor.push_undo_stop();
        let result = editor.replace_all(&self.code, "bugfinder");
        editor.push_undo_stop();

        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to apply bug fixes");
            editor.push_undo_stop();
            if let Err(restore) = editor.replace_all(&self.original_code, "bugfinder") {
                tracing::warn!(error = %restore, "failed to restore original content");
            }
            editor.push_undo_stop();
            return Err(e);
        }

        Ok("Bug fixes applied successfully.".to_string())
    }
}

struct ClearOnDrop<'a> {
    processing: &'a AtomicBool,
    cancel: &'a Mutex<Option<CancellationToken>>,
}

impl Drop for ClearOnDrop<'_> {
    fn drop(&mut self) {
        *lock_token(self.cancel) = None;
        self.processing.store(false, Ordering::SeqCst);
    }
}

fn lock_token(cancel: &Mutex<Option<CancellationToken>>) -> MutexGuard<'_, Option<CancellationToken>> {
    match cancel.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Bug analysis orchestrator
pub struct BugFinder {
    editor: Option<SharedEditor>,
    provider: Arc<dyn LlmProvider>,
    processing: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
}

impl BugFinder {
    pub fn new(editor: Option<SharedEditor>, provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            editor,
            provider,
            processing: AtomicBool::new(false),
            cancel: Mutex::new(None),
        }
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Ask the provider for a bug report on the whole editor content.
    /// `input` and `stdin` describe how the program is meant to be run.
    pub async fn find_bugs(&self, input: &str, stdin: &str) -> BugFinderOutcome {
        if self
            .processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("bug analysis already running");
            return BugFinderOutcome::Busy;
        }

        let cancel = CancellationToken::new();
        *lock_token(&self.cancel) = Some(cancel.clone());
        let _guard = ClearOnDrop {
            processing: &self.processing,
            cancel: &self.cancel,
        };

        match self.run(input, stdin, cancel).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error = %e, "bug analysis failed");
                BugFinderOutcome::Failed {
                    message: format!("Error during bug analysis: {}", e),
                    source: e,
                }
            }
        }
    }

    /// Cancel the in-flight analysis. The run then reports a failure.
    pub fn stop(&self) {
        if let Some(cancel) = lock_token(&self.cancel).as_ref() {
            tracing::debug!("stopping bug analysis");
            cancel.cancel();
        }
    }

    async fn run(
        &self,
        input: &str,
        stdin: &str,
        cancel: CancellationToken,
    ) -> Result<BugFinderOutcome> {
        let editor = self.editor.clone().ok_or(AssistError::NoActiveEditor)?;

        let request = {
            let editor = lock_editor(&editor);
            BugAnalysisRequest {
                code: editor.content(),
                file_extension: editor.file_extension(),
                language_name: editor.language_name(),
                input: input.to_string(),
                stdin: stdin.to_string(),
            }
        };

        let original_code = request.code.clone();
        let language = request.file_extension.clone();
        let report = self.provider.analyze_bugs(request, cancel).await?;

        if !report.has_bugs {
            return Ok(BugFinderOutcome::NoBugs {
                message: "No bugs detected in the code.".to_string(),
            });
        }

        let code = report.fixed_code.ok_or_else(|| {
            AssistError::InvalidResponseFormat("hasBugs is true but fixedCode is missing".to_string())
        })?;

        tracing::debug!(language = %language, "bugs found");
        Ok(BugFinderOutcome::BugsFound(BugFixPreview {
            editor,
            explanation: report.explanation,
            code,
            original_code,
            language,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::{shared, EditorHost, TextBuffer};
    use crate::llm::mock_provider::{MockProvider, MockResponse};

    fn finder(content: &str, provider: MockProvider) -> (SharedEditor, BugFinder) {
        let editor = shared(TextBuffer::new(content).with_extension("py"));
        let finder = BugFinder::new(Some(editor.clone()), Arc::new(provider));
        (editor, finder)
    }

    #[tokio::test]
    async fn test_no_bugs() {
        let provider = MockProvider::new().with_response(r#"{"hasBugs": false, "explanation": ""}"#);
        let (_editor, finder) = finder("print(1)", provider);

        match finder.find_bugs("", "").await {
            BugFinderOutcome::NoBugs { message } => {
                assert_eq!(message, "No bugs detected in the code.");
            }
            other => panic!("expected no bugs, got {:?}", other),
        }
        assert!(!finder.is_processing());
    }

    #[tokio::test]
    async fn test_bugs_found_and_applied() {
        let provider = MockProvider::new().with_response(
            r#"{"hasBugs": true, "explanation": "x is undefined", "fixedCode": "x = 1\nprint(x)"}"#,
        );
        let (editor, finder) = finder("print(x)", provider.clone());

        let outcome = finder.find_bugs("", "5").await;
        let preview = match outcome {
            BugFinderOutcome::BugsFound(preview) => preview,
            other => panic!("expected bugs, got {:?}", other),
        };
        assert_eq!(preview.explanation(), "x is undefined");
        assert_eq!(preview.language(), "py");
        assert_eq!(lock_editor(&editor).content(), "print(x)");

        let prompt = &provider.last_request().unwrap().messages[0].content;
        assert!(prompt.contains("Stdin: 5"));

        assert_eq!(preview.apply().unwrap(), "Bug fixes applied successfully.");
        assert_eq!(lock_editor(&editor).content(), "x = 1\nprint(x)");
    }

    #[tokio::test]
    async fn test_malformed_report_fails() {
        let provider = MockProvider::new().with_response("Looks fine to me!");
        let (_editor, finder) = finder("print(1)", provider);

        match finder.find_bugs("", "").await {
            BugFinderOutcome::Failed { message, source } => {
                assert!(message.starts_with("Error during bug analysis: "));
                assert!(matches!(source, AssistError::InvalidResponseFormat(_)));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_fixed_code_fails() {
        let provider = MockProvider::new().with_response(r#"{"hasBugs": true, "explanation": "bad"}"#);
        let (_editor, finder) = finder("print(1)", provider);

        assert!(matches!(
            finder.find_bugs("", "").await,
            BugFinderOutcome::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn test_stop_is_reported_as_failure() {
        let provider = MockProvider::new().with_script(vec![MockResponse::Pending]);
        let (_editor, finder) = finder("print(1)", provider);
        let finder = Arc::new(finder);

        let running = {
            let finder = finder.clone();
            tokio::spawn(async move { finder.find_bugs("", "").await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(finder.is_processing());
        finder.stop();

        match running.await.unwrap() {
            BugFinderOutcome::Failed { source, .. } => assert!(source.is_cancelled()),
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(!finder.is_processing());
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let finder = BugFinder::new(None, Arc::new(MockProvider::new()));
        finder.stop();
        assert!(!finder.is_processing());
    }

    #[tokio::test]
    async fn test_missing_editor() {
        let finder = BugFinder::new(None, Arc::new(MockProvider::new()));
        match finder.find_bugs("", "").await {
            BugFinderOutcome::Failed { source, .. } => {
                assert!(matches!(source, AssistError::NoActiveEditor));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_apply_rejected_edit_keeps_original() {
        let provider = MockProvider::new()
            .with_response(r#"{"hasBugs": true, "explanation": "e", "fixedCode": "fixed"}"#);
        let buffer = std::sync::Arc::new(std::sync::Mutex::new(TextBuffer::new("broken")));
        let editor: SharedEditor = buffer.clone();
        let finder = BugFinder::new(Some(editor), Arc::new(provider));

        let BugFinderOutcome::BugsFound(preview) =
            finder.find_bugs("", "").await
        else {
            panic!("expected bugs");
        };
        buffer.lock().unwrap().set_read_only(true);

        assert!(preview.apply().is_err());
        assert_eq!(buffer.lock().unwrap().content(), "broken");
    }
}
