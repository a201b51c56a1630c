// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Suggestion state machine
//!
//! Every input is an explicit method call carrying the current time, so the
//! inactivity contract can be driven deterministically. A suggestion is
//! requested only after the buffer has been idle for the inactivity delay
//! following an edit, and only when the cursor sits in a comment.
//!
//! While displayed, a suggestion of `N` lines occupies `N` blank lines
//! reserved after the cursor line `K`, each decorated with ghost text.
//! Reserving, clearing and accepting edit the range from the end of line `K`
//! to the start of line `K + N`, each as one undoable unit.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use super::comment;
use super::indent::IndentContext;
use crate::config::AutocompleteConfig;
use crate::editor::{
    lock_editor, Decoration, EditorEvent, EditorHost, Key, KeyInput, Position, SharedEditor,
    TextRange,
};
use crate::error::Result;
use crate::llm::provider::{AutoCompleteRequest, LlmProvider};

/// Wait after an edit before checking for inactivity
pub const DEFAULT_SUGGEST_DELAY: Duration = Duration::from_millis(350);
/// Idle time required before a suggestion is requested
pub const DEFAULT_INACTIVITY_DELAY: Duration = Duration::from_millis(2000);

/// Decoration class for ghost text
pub const GHOST_TEXT_CLASS: &str = "ghost-text";

pub const SOURCE_CREATE_SPACE: &str = "create-space";
pub const SOURCE_ACCEPT: &str = "accept-suggestion";
pub const SOURCE_CLEAR: &str = "clear-suggestion";
pub const SOURCE_RESTORE: &str = "restore-content";

/// Edits made by the engine itself; their change events are not user activity
const ENGINE_SOURCES: &[&str] = &[
    SOURCE_CREATE_SPACE,
    SOURCE_ACCEPT,
    SOURCE_CLEAR,
    SOURCE_RESTORE,
];

/// The suggestion currently shown as ghost text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionState {
    /// Shaped suggestion lines joined by `\n`
    pub text: String,
    /// First reserved line (1-based)
    pub insertion_line: usize,
    /// Number of reserved lines
    pub line_count: usize,
    /// Lines after the cursor line at display time; `None` when the cursor
    /// line was the last line
    pub saved_trailing_content: Option<String>,
}

impl SuggestionState {
    fn anchor_line(&self) -> usize {
        self.insertion_line - 1
    }
}

/// Coarse engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    PendingCheck,
    Requesting,
    Displaying,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckPhase {
    First,
    Second,
}

#[derive(Debug)]
enum Phase {
    Idle,
    PendingCheck { due: Instant, check: CheckPhase },
    Requesting { generation: u64, cancel: CancellationToken },
}

/// Provider call issued by [`SuggestionEngine::poll`]. Run it with
/// [`SuggestionRequest::send`] and hand the reply to
/// [`SuggestionEngine::on_reply`].
pub struct SuggestionRequest {
    pub request: AutoCompleteRequest,
    pub cancel: CancellationToken,
    generation: u64,
    anchor: Position,
    indent: IndentContext,
    provider: Arc<dyn LlmProvider>,
}

impl std::fmt::Debug for SuggestionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuggestionRequest")
            .field("request", &self.request)
            .field("generation", &self.generation)
            .field("anchor", &self.anchor)
            .finish()
    }
}

impl SuggestionRequest {
    pub async fn send(self) -> SuggestionReply {
        let result = self
            .provider
            .auto_complete(self.request, self.cancel)
            .await;
        SuggestionReply {
            result,
            generation: self.generation,
            anchor: self.anchor,
            indent: self.indent,
        }
    }
}

/// Provider answer for a [`SuggestionRequest`]
#[derive(Debug)]
pub struct SuggestionReply {
    pub result: Result<String>,
    generation: u64,
    anchor: Position,
    indent: IndentContext,
}

/// Comment-driven inline suggestion engine
pub struct SuggestionEngine {
    editor: Option<SharedEditor>,
    provider: Option<Arc<dyn LlmProvider>>,
    suggest_delay: Duration,
    inactivity_delay: Duration,
    last_activity: Instant,
    last_cursor_line: Option<usize>,
    phase: Phase,
    suggestion: Option<SuggestionState>,
    generation: u64,
    disposed: bool,
}

impl SuggestionEngine {
    pub fn new(editor: SharedEditor, provider: Arc<dyn LlmProvider>, now: Instant) -> Self {
        Self {
            editor: Some(editor),
            provider: Some(provider),
            suggest_delay: DEFAULT_SUGGEST_DELAY,
            inactivity_delay: DEFAULT_INACTIVITY_DELAY,
            last_activity: now,
            last_cursor_line: None,
            phase: Phase::Idle,
            suggestion: None,
            generation: 0,
            disposed: false,
        }
    }

    pub fn with_delays(mut self, suggest_delay: Duration, inactivity_delay: Duration) -> Self {
        self.suggest_delay = suggest_delay;
        self.inactivity_delay = inactivity_delay;
        self
    }

    /// Take both delays from settings
    pub fn with_config(self, config: &AutocompleteConfig) -> Self {
        self.with_delays(
            Duration::from_millis(config.suggest_delay_ms),
            Duration::from_millis(config.inactivity_delay_ms),
        )
    }

    pub fn state(&self) -> EngineState {
        if self.suggestion.is_some() {
            return EngineState::Displaying;
        }
        match self.phase {
            Phase::Idle => EngineState::Idle,
            Phase::PendingCheck { .. } => EngineState::PendingCheck,
            Phase::Requesting { .. } => EngineState::Requesting,
        }
    }

    /// Suggestion on display, if any
    pub fn suggestion(&self) -> Option<&SuggestionState> {
        self.suggestion.as_ref()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Dispatch a host event. Returns true when a key press was consumed.
    pub fn handle_event(&mut self, now: Instant, event: EditorEvent) -> bool {
        match event {
            EditorEvent::ContentChanged { source } => {
                self.on_content_changed(now, &source);
                false
            }
            EditorEvent::CursorMoved { line } => {
                self.on_cursor_moved(line);
                false
            }
            EditorEvent::PointerActivity => {
                self.on_pointer_activity(now);
                false
            }
            EditorEvent::Key(key) => {
                if !self.disposed {
                    self.last_activity = now;
                }
                self.on_key(key)
            }
        }
    }

    /// Mouse activity postpones suggestions without clearing one
    pub fn on_pointer_activity(&mut self, now: Instant) {
        if self.disposed {
            return;
        }
        self.last_activity = now;
    }

    /// An edit clears the suggestion and restarts the inactivity check.
    /// Edits made by the engine and edits during a request are ignored.
    pub fn on_content_changed(&mut self, now: Instant, source: &str) {
        if self.disposed || ENGINE_SOURCES.contains(&source) {
            return;
        }
        if matches!(self.phase, Phase::Requesting { .. }) {
            return;
        }

        self.last_activity = now;
        self.clear_suggestion();
        self.phase = Phase::PendingCheck {
            due: now + self.suggest_delay,
            check: CheckPhase::First,
        };
    }

    /// Moving to another line clears the suggestion and abandons a request
    /// made for the old line
    pub fn on_cursor_moved(&mut self, line: usize) {
        if self.disposed {
            return;
        }
        if self.last_cursor_line.is_some_and(|last| last != line) {
            self.clear_suggestion();
            if let Phase::Requesting { cancel, .. } = &self.phase {
                tracing::debug!("cursor left the requested line, cancelling suggestion");
                cancel.cancel();
                self.phase = Phase::Idle;
            }
        }
        self.last_cursor_line = Some(line);
    }

    /// Tab, Enter and Ctrl-K accept a displayed suggestion and are consumed;
    /// Escape clears it
    pub fn on_key(&mut self, input: KeyInput) -> bool {
        if self.disposed || self.suggestion.is_none() {
            return false;
        }
        match input.key {
            Key::Tab | Key::Enter => {
                self.accept_suggestion();
                true
            }
            Key::Char('k') | Key::Char('K') if input.ctrl => {
                self.accept_suggestion();
                true
            }
            Key::Escape => {
                self.clear_suggestion();
                false
            }
            _ => false,
        }
    }

    /// Advance the inactivity check. Returns a request when one should be
    /// sent now.
    pub fn poll(&mut self, now: Instant) -> Option<SuggestionRequest> {
        if self.disposed {
            return None;
        }
        let Phase::PendingCheck { due, check } = self.phase else {
            return None;
        };
        if now < due {
            return None;
        }

        let idle = now.saturating_duration_since(self.last_activity);
        if idle >= self.inactivity_delay {
            return self.request_now();
        }

        match check {
            CheckPhase::First => {
                let remaining = self.inactivity_delay - idle;
                tracing::trace!(?remaining, "recent activity, waiting for inactivity");
                self.phase = Phase::PendingCheck {
                    due: now + remaining,
                    check: CheckPhase::Second,
                };
            }
            CheckPhase::Second => {
                self.phase = Phase::Idle;
            }
        }
        None
    }

    /// Build a request for the current cursor position, skipping the timers.
    /// Outside a comment the suggestion is cleared and nothing is requested.
    pub fn request_now(&mut self) -> Option<SuggestionRequest> {
        if self.disposed || matches!(self.phase, Phase::Requesting { .. }) {
            return None;
        }
        self.phase = Phase::Idle;
        let (editor, provider) = match (&self.editor, &self.provider) {
            (Some(editor), Some(provider)) => (editor.clone(), provider.clone()),
            _ => return None,
        };

        let (cursor, lines_to_cursor, language_id, language_name) = {
            let editor = lock_editor(&editor);
            let cursor = editor.cursor();
            let lines: Vec<String> = (1..=cursor.line)
                .map(|line| editor.line_content(line).unwrap_or_default())
                .collect();
            (cursor, lines, editor.language_id(), editor.language_name())
        };

        if !comment::cursor_in_comment(&lines_to_cursor, cursor) {
            tracing::debug!(line = cursor.line, "cursor not in a comment, skipping suggestion");
            self.clear_suggestion();
            return None;
        }

        let current = lines_to_cursor.last().cloned().unwrap_or_default();
        let split = current
            .char_indices()
            .nth(cursor.column.saturating_sub(1))
            .map(|(offset, _)| offset)
            .unwrap_or(current.len());
        let indent = IndentContext::compute(&lines_to_cursor, &language_id);

        self.generation += 1;
        let cancel = CancellationToken::new();
        self.phase = Phase::Requesting {
            generation: self.generation,
            cancel: cancel.clone(),
        };

        tracing::debug!(
            line = cursor.line,
            column = cursor.column,
            language = %language_id,
            "requesting suggestion"
        );

        Some(SuggestionRequest {
            request: AutoCompleteRequest {
                prefix: current[..split].to_string(),
                suffix: current[split..].to_string(),
                file_extension: language_id,
                language_name,
                ..Default::default()
            },
            cancel,
            generation: self.generation,
            anchor: cursor,
            indent,
            provider,
        })
    }

    /// Apply a provider reply. Replies for anything but the current request
    /// are dropped.
    pub fn on_reply(&mut self, reply: SuggestionReply) {
        if self.disposed {
            return;
        }
        match self.phase {
            Phase::Requesting { generation, .. } if generation == reply.generation => {}
            _ => {
                tracing::debug!(generation = reply.generation, "dropping stale suggestion reply");
                return;
            }
        }
        self.phase = Phase::Idle;

        match reply.result {
            Ok(text) if !text.trim().is_empty() => {
                self.clear_suggestion();
                let lines = reply.indent.shape(&text);
                self.display(reply.anchor.line, lines);
            }
            Ok(_) => self.clear_suggestion(),
            Err(e) => {
                if e.is_cancelled() {
                    tracing::debug!("suggestion request cancelled");
                } else {
                    tracing::warn!(error = %e, "suggestion request failed");
                }
                self.clear_suggestion();
            }
        }
    }

    /// Poll, and when due, run the request to completion
    pub async fn tick(&mut self, now: Instant) -> bool {
        let Some(request) = self.poll(now) else {
            return false;
        };
        let reply = request.send().await;
        self.on_reply(reply);
        true
    }

    fn display(&mut self, anchor_line: usize, lines: Vec<String>) {
        let Some(editor) = &self.editor else {
            return;
        };
        let mut editor = lock_editor(editor);
        let line_count = editor.line_count();
        if anchor_line == 0 || anchor_line > line_count {
            tracing::debug!(anchor_line, "suggestion anchor no longer exists");
            return;
        }

        let saved_trailing_content = trailing_content(&*editor, anchor_line);
        let end = editor.line_max_column(anchor_line);
        let count = lines.len();

        editor.push_undo_stop();
        let reserved = editor.apply_edit(
            TextRange::new(anchor_line, end, anchor_line, end),
            &"\n".repeat(count),
            SOURCE_CREATE_SPACE,
        );
        if let Err(e) = reserved {
            tracing::warn!(error = %e, "failed to reserve suggestion lines");
            return;
        }

        let decorations = lines
            .iter()
            .enumerate()
            .map(|(index, line)| Decoration {
                line: anchor_line + 1 + index,
                after_text: line.clone(),
                class: GHOST_TEXT_CLASS.to_string(),
            })
            .collect();
        editor.set_decorations(decorations);
        editor.push_undo_stop();

        tracing::debug!(line = anchor_line + 1, lines = count, "suggestion displayed");
        self.suggestion = Some(SuggestionState {
            text: lines.join("\n"),
            insertion_line: anchor_line + 1,
            line_count: count,
            saved_trailing_content,
        });
    }

    /// Commit the displayed suggestion into the reserved lines
    pub fn accept_suggestion(&mut self) {
        let Some(state) = self.suggestion.take() else {
            return;
        };
        let Some(editor) = &self.editor else {
            return;
        };
        let mut editor = lock_editor(editor);

        let anchor = state.anchor_line();
        let range = reserved_range(&*editor, &state);
        editor.push_undo_stop();
        if let Err(e) = editor.apply_edit(range, &format!("\n{}", state.text), SOURCE_ACCEPT) {
            tracing::warn!(error = %e, "failed to accept suggestion");
        }
        editor.push_undo_stop();
        editor.set_decorations(Vec::new());
        tracing::debug!(line = anchor + 1, "suggestion accepted");
    }

    /// Remove the reserved lines and put back what followed the cursor line
    pub fn clear_suggestion(&mut self) {
        let Some(editor) = &self.editor else {
            self.suggestion = None;
            return;
        };
        let mut editor = lock_editor(editor);
        let Some(state) = self.suggestion.take() else {
            return;
        };

        let anchor = state.anchor_line();
        editor.push_undo_stop();
        let range = reserved_range(&*editor, &state);
        if let Err(e) = editor.apply_edit(range, "", SOURCE_CLEAR) {
            tracing::warn!(error = %e, "failed to remove suggestion lines");
        }

        if anchor <= editor.line_count()
            && trailing_content(&*editor, anchor) != state.saved_trailing_content
        {
            let last = editor.line_count();
            let restore = TextRange::new(
                anchor,
                editor.line_max_column(anchor),
                last,
                editor.line_max_column(last),
            );
            let text = state
                .saved_trailing_content
                .as_ref()
                .map(|saved| format!("\n{}", saved))
                .unwrap_or_default();
            if let Err(e) = editor.apply_edit(restore, &text, SOURCE_RESTORE) {
                tracing::warn!(error = %e, "failed to restore content after suggestion");
            }
        }

        editor.push_undo_stop();
        editor.set_decorations(Vec::new());
    }

    /// Clear the suggestion, cancel pending work and release the editor and
    /// provider. Every later call is a no-op.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.clear_suggestion();
        if let Phase::Requesting { cancel, .. } = &self.phase {
            cancel.cancel();
        }
        self.phase = Phase::Idle;
        self.editor = None;
        self.provider = None;
        self.disposed = true;
        tracing::debug!("suggestion engine disposed");
    }
}

/// Lines after `line`, or `None` when `line` is the last one
fn trailing_content(editor: &dyn EditorHost, line: usize) -> Option<String> {
    let count = editor.line_count();
    if line >= count {
        return None;
    }
    let lines: Vec<String> = (line + 1..=count)
        .map(|l| editor.line_content(l).unwrap_or_default())
        .collect();
    Some(lines.join("\n"))
}

/// End of the anchor line through the start of the last reserved line,
/// clamped to the buffer
fn reserved_range(editor: &dyn EditorHost, state: &SuggestionState) -> TextRange {
    let anchor = state.anchor_line().min(editor.line_count());
    let last = (anchor + state.line_count).min(editor.line_count());
    TextRange::new(anchor, editor.line_max_column(anchor), last, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::{shared, TextBuffer};
    use crate::llm::mock_provider::{MockProvider, MockResponse};

    struct Fixture {
        buffer: Arc<std::sync::Mutex<TextBuffer>>,
        provider: MockProvider,
        engine: SuggestionEngine,
        start: Instant,
    }

    fn fixture(content: &str, cursor: Position, provider: MockProvider) -> Fixture {
        let mut buffer = TextBuffer::new(content).with_extension("rs");
        buffer.set_cursor(cursor);
        let buffer = Arc::new(std::sync::Mutex::new(buffer));
        let editor: SharedEditor = buffer.clone();
        let start = Instant::now();
        let engine = SuggestionEngine::new(editor, Arc::new(provider.clone()), start);
        Fixture {
            buffer,
            provider,
            engine,
            start,
        }
    }

    fn content(fixture: &Fixture) -> String {
        fixture.buffer.lock().unwrap().content()
    }

    const CODE: &str = "fn main() {\n    // greet the user\n    run();\n}";

    async fn display(fixture: &mut Fixture) {
        let t = fixture.start;
        fixture.engine.on_content_changed(t, "typing");
        assert!(fixture.engine.tick(t + Duration::from_millis(2000)).await);
        assert_eq!(fixture.engine.state(), EngineState::Displaying);
    }

    #[tokio::test]
    async fn test_two_phase_inactivity_check() {
        let mut f = fixture(CODE, Position::new(2, 22), MockProvider::new().with_response("x"));
        let t = f.start;

        f.engine.on_content_changed(t, "typing");
        assert_eq!(f.engine.state(), EngineState::PendingCheck);

        assert!(f.engine.poll(t + Duration::from_millis(100)).is_none());
        // First check at 350ms: still recently active, re-armed for 2000ms
        assert!(f.engine.poll(t + Duration::from_millis(350)).is_none());
        assert_eq!(f.engine.state(), EngineState::PendingCheck);
        assert!(f.engine.poll(t + Duration::from_millis(1999)).is_none());

        let request = f.engine.poll(t + Duration::from_millis(2000)).unwrap();
        assert_eq!(f.engine.state(), EngineState::Requesting);
        assert_eq!(request.request.prefix, "    // greet the user");
        assert_eq!(request.request.suffix, "");
        assert_eq!(request.request.file_extension, "rust");
        assert_eq!(request.request.language_name, "Rust");
    }

    #[tokio::test]
    async fn test_activity_during_wait_cancels_check() {
        let mut f = fixture(CODE, Position::new(2, 22), MockProvider::new().with_response("x"));
        let t = f.start;

        f.engine.on_content_changed(t, "typing");
        assert!(f.engine.poll(t + Duration::from_millis(350)).is_none());
        f.engine.on_pointer_activity(t + Duration::from_millis(1500));

        assert!(f.engine.poll(t + Duration::from_millis(2000)).is_none());
        assert_eq!(f.engine.state(), EngineState::Idle);
        assert_eq!(f.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_code_line_never_requests() {
        let mut f = fixture(CODE, Position::new(3, 5), MockProvider::new().with_response("x"));
        let t = f.start;

        f.engine.on_content_changed(t, "typing");
        assert!(!f.engine.tick(t + Duration::from_millis(5000)).await);
        assert_eq!(f.provider.call_count(), 0);
        assert_eq!(f.engine.state(), EngineState::Idle);
    }

    #[tokio::test]
    async fn test_display_reserves_lines_with_ghost_text() {
        let provider = MockProvider::new().with_response("println!(\"hi\");\nprintln!(\"bye\");");
        let mut f = fixture(CODE, Position::new(2, 22), provider);
        display(&mut f).await;

        assert_eq!(
            content(&f),
            "fn main() {\n    // greet the user\n\n\n    run();\n}"
        );
        let state = f.engine.suggestion().unwrap().clone();
        assert_eq!(state.insertion_line, 3);
        assert_eq!(state.line_count, 2);
        assert_eq!(state.saved_trailing_content.as_deref(), Some("    run();\n}"));

        let buffer = f.buffer.lock().unwrap();
        let decorations = buffer.decorations();
        assert_eq!(decorations.len(), 2);
        assert_eq!(decorations[0].line, 3);
        assert_eq!(decorations[0].after_text, "    println!(\"hi\");");
        assert_eq!(decorations[1].class, GHOST_TEXT_CLASS);
    }

    #[tokio::test]
    async fn test_clear_restores_exact_content() {
        let provider = MockProvider::new().with_response("a();\nb();\nc();");
        let mut f = fixture(CODE, Position::new(2, 22), provider);
        display(&mut f).await;

        assert!(!f.engine.on_key(KeyInput::plain(Key::Escape)));
        assert_eq!(content(&f), CODE);
        assert_eq!(f.engine.state(), EngineState::Idle);
        assert!(f.buffer.lock().unwrap().decorations().is_empty());
    }

    #[tokio::test]
    async fn test_accept_inserts_suggestion() {
        let provider = MockProvider::new().with_response("a();\nb();");
        let mut f = fixture(CODE, Position::new(2, 22), provider);
        display(&mut f).await;

        assert!(f.engine.on_key(KeyInput::plain(Key::Tab)));
        assert_eq!(
            content(&f),
            "fn main() {\n    // greet the user\n    a();\n    b();\n    run();\n}"
        );
        assert!(f.engine.suggestion().is_none());
        assert!(f.buffer.lock().unwrap().decorations().is_empty());

        // The engine's own edit does not restart the check
        f.engine.on_content_changed(f.start, SOURCE_ACCEPT);
        assert_eq!(f.engine.state(), EngineState::Idle);
    }

    #[tokio::test]
    async fn test_accept_on_last_line() {
        let provider = MockProvider::new().with_response("done();");
        let mut f = fixture("// finish", Position::new(1, 10), provider);
        display(&mut f).await;
        assert_eq!(content(&f), "// finish\n");
        assert!(f.engine.suggestion().unwrap().saved_trailing_content.is_none());

        assert!(f.engine.on_key(KeyInput::ctrl(Key::Char('k'))));
        assert_eq!(content(&f), "// finish\ndone();");
    }

    #[tokio::test]
    async fn test_clear_on_last_line_restores() {
        let provider = MockProvider::new().with_response("done();\nmore();");
        let mut f = fixture("// finish", Position::new(1, 10), provider);
        display(&mut f).await;

        f.engine.clear_suggestion();
        assert_eq!(content(&f), "// finish");
    }

    #[tokio::test]
    async fn test_cursor_line_change_clears() {
        let provider = MockProvider::new().with_response("a();");
        let mut f = fixture(CODE, Position::new(2, 22), provider);
        f.engine.on_cursor_moved(2);
        display(&mut f).await;

        f.engine.on_cursor_moved(2);
        assert_eq!(f.engine.state(), EngineState::Displaying);
        f.engine.on_cursor_moved(1);
        assert_eq!(f.engine.state(), EngineState::Idle);
        assert_eq!(content(&f), CODE);
    }

    #[tokio::test]
    async fn test_empty_or_failed_reply_shows_nothing() {
        let provider = MockProvider::new().with_script(vec![
            MockResponse::text("   "),
            MockResponse::server_error("boom"),
        ]);
        let mut f = fixture(CODE, Position::new(2, 22), provider);
        let t = f.start;

        for _ in 0..2 {
            f.engine.on_content_changed(t, "typing");
            assert!(f.engine.tick(t + Duration::from_millis(2000)).await);
            assert_eq!(f.engine.state(), EngineState::Idle);
            assert_eq!(content(&f), CODE);
        }
    }

    #[tokio::test]
    async fn test_edits_during_request_are_ignored() {
        let mut f = fixture(CODE, Position::new(2, 22), MockProvider::new().with_response("a();"));
        let t = f.start;
        f.engine.on_content_changed(t, "typing");
        let request = f.engine.poll(t + Duration::from_millis(2000)).unwrap();

        f.engine.on_content_changed(t + Duration::from_millis(2100), "typing");
        assert_eq!(f.engine.state(), EngineState::Requesting);

        f.engine.on_reply(request.send().await);
        assert_eq!(f.engine.state(), EngineState::Displaying);
    }

    #[tokio::test]
    async fn test_stale_reply_dropped() {
        let mut f = fixture(CODE, Position::new(2, 22), MockProvider::new().with_response("a();"));
        f.engine.on_cursor_moved(2);
        let first = f.engine.request_now().unwrap();

        f.engine.on_cursor_moved(3);
        assert!(first.cancel.is_cancelled());
        assert_eq!(f.engine.state(), EngineState::Idle);

        f.engine.on_reply(first.send().await);
        assert_eq!(f.engine.state(), EngineState::Idle);
        assert_eq!(content(&f), CODE);
    }

    #[tokio::test]
    async fn test_dispose_clears_and_ignores_later_calls() {
        let provider = MockProvider::new().with_response("a();");
        let mut f = fixture(CODE, Position::new(2, 22), provider);
        display(&mut f).await;

        f.engine.dispose();
        assert!(f.engine.is_disposed());
        assert_eq!(content(&f), CODE);

        let t = f.start;
        f.engine.on_content_changed(t, "typing");
        assert!(f.engine.poll(t + Duration::from_secs(10)).is_none());
        assert!(!f.engine.on_key(KeyInput::plain(Key::Tab)));
        assert_eq!(f.engine.state(), EngineState::Idle);
        f.engine.dispose();
    }

    #[tokio::test]
    async fn test_undo_after_accept_restores_reserved_state() {
        let provider = MockProvider::new().with_response("a();");
        let mut f = fixture(CODE, Position::new(2, 22), provider);
        display(&mut f).await;
        f.engine.accept_suggestion();

        let mut buffer = f.buffer.lock().unwrap();
        assert!(buffer.undo());
        assert_eq!(buffer.content(), "fn main() {\n    // greet the user\n\n    run();\n}");
    }

    #[test]
    fn test_config_delays() {
        let editor = shared(TextBuffer::new(""));
        let config = AutocompleteConfig {
            suggest_delay_ms: 10,
            inactivity_delay_ms: 20,
            ..Default::default()
        };
        let engine = SuggestionEngine::new(editor, Arc::new(MockProvider::new()), Instant::now())
            .with_config(&config);
        assert_eq!(engine.suggest_delay, Duration::from_millis(10));
        assert_eq!(engine.inactivity_delay, Duration::from_millis(20));
    }
}
