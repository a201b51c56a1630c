// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! In-memory text buffer
//!
//! Lines are split on `\n` only, so a trailing newline shows up as an empty
//! last line and `content()` round-trips byte for byte.

use tokio::sync::mpsc::UnboundedSender;

use super::diagnostics::{DelimiterLinter, Diagnostic, Linter};
use super::undo::{BufferSnapshot, UndoStack};
use super::{Decoration, EditorEvent, EditorHost, Language, Position, TextRange};
use crate::error::{AssistError, Result};

/// Line-addressed text buffer implementing [`EditorHost`]
pub struct TextBuffer {
    /// The text content as lines
    lines: Vec<String>,
    /// Cursor position
    cursor: Position,
    /// Undo/redo history
    history: UndoStack,
    /// Inline decorations
    decorations: Vec<Decoration>,
    /// Diagnostics source
    linter: Box<dyn Linter>,
    /// Language of the content
    language: Language,
    /// Reject every edit
    read_only: bool,
    /// Whether the content has been modified
    modified: bool,
    /// Sources of applied edits, oldest first
    edit_log: Vec<String>,
    /// Change notifications
    listener: Option<UnboundedSender<EditorEvent>>,
}

impl std::fmt::Debug for TextBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextBuffer")
            .field("lines", &self.lines)
            .field("cursor", &self.cursor)
            .field("language", &self.language)
            .field("read_only", &self.read_only)
            .field("modified", &self.modified)
            .finish()
    }
}

fn split_lines(content: &str) -> Vec<String> {
    content.split('\n').map(str::to_string).collect()
}

/// Byte offset of 1-based `column` in `line`
fn byte_index(line: &str, column: usize) -> usize {
    line.char_indices()
        .nth(column.saturating_sub(1))
        .map(|(offset, _)| offset)
        .unwrap_or(line.len())
}

impl TextBuffer {
    /// Create a new plain-text buffer with the given content
    pub fn new(content: &str) -> Self {
        Self {
            lines: split_lines(content),
            cursor: Position::new(1, 1),
            history: UndoStack::new(),
            decorations: Vec::new(),
            linter: Box::new(DelimiterLinter),
            language: Language::default(),
            read_only: false,
            modified: false,
            edit_log: Vec::new(),
            listener: None,
        }
    }

    /// Set the language from a file extension
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.language = Language::from_extension(extension);
        self
    }

    /// Replace the diagnostics source
    pub fn with_linter(mut self, linter: impl Linter + 'static) -> Self {
        self.linter = Box::new(linter);
        self
    }

    /// Send an [`EditorEvent::ContentChanged`] for every edit
    pub fn with_listener(mut self, listener: UnboundedSender<EditorEvent>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn decorations(&self) -> &[Decoration] {
        &self.decorations
    }

    /// Sources of applied edits, oldest first
    pub fn edit_log(&self) -> &[String] {
        &self.edit_log
    }

    /// Move the cursor, clamped to the buffer
    pub fn set_cursor(&mut self, position: Position) {
        self.cursor = position;
        self.clamp_cursor();
        self.notify(EditorEvent::CursorMoved {
            line: self.cursor.line,
        });
    }

    fn snapshot(&self) -> BufferSnapshot {
        BufferSnapshot {
            content: self.lines.join("\n"),
            cursor: self.cursor,
        }
    }

    fn restore_snapshot(&mut self, snapshot: BufferSnapshot, source: &str) {
        self.lines = split_lines(&snapshot.content);
        self.cursor = snapshot.cursor;
        self.clamp_cursor();
        self.modified = true;
        self.edit_log.push(source.to_string());
        self.notify(EditorEvent::ContentChanged {
            source: source.to_string(),
        });
    }

    /// Undo the last unit. Returns false when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let current = self.snapshot();
        match self.history.undo(current) {
            Some(snapshot) => {
                self.restore_snapshot(snapshot, "undo");
                true
            }
            None => false,
        }
    }

    /// Redo the last undone unit
    pub fn redo(&mut self) -> bool {
        let current = self.snapshot();
        match self.history.redo(current) {
            Some(snapshot) => {
                self.restore_snapshot(snapshot, "redo");
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Content with decorations rendered through `render`, which receives
    /// each decoration's text
    pub fn render_with(&self, render: impl Fn(&str) -> String) -> String {
        self.lines
            .iter()
            .enumerate()
            .map(|(index, line)| {
                let mut rendered = line.clone();
                for decoration in self.decorations.iter().filter(|d| d.line == index + 1) {
                    rendered.push_str(&render(&decoration.after_text));
                }
                rendered
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn notify(&self, event: EditorEvent) {
        if let Some(listener) = &self.listener {
            // Receiver gone means nobody is listening any more
            let _ = listener.send(event);
        }
    }

    fn clamp_cursor(&mut self) {
        let last = self.lines.len();
        self.cursor.line = self.cursor.line.clamp(1, last);
        let max_column = self.line_max_column(self.cursor.line);
        self.cursor.column = self.cursor.column.clamp(1, max_column);
    }

    fn check_position(&self, position: Position) -> Result<()> {
        if position.line == 0 || position.line > self.lines.len() {
            return Err(AssistError::Editor(format!(
                "line {} is outside 1..={}",
                position.line,
                self.lines.len()
            )));
        }
        let max_column = self.line_max_column(position.line);
        if position.column == 0 || position.column > max_column {
            return Err(AssistError::Editor(format!(
                "column {} is outside 1..={} on line {}",
                position.column, max_column, position.line
            )));
        }
        Ok(())
    }
}

impl EditorHost for TextBuffer {
    fn content(&self) -> String {
        self.lines.join("\n")
    }

    fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn line_content(&self, line: usize) -> Option<String> {
        line.checked_sub(1)
            .and_then(|index| self.lines.get(index))
            .cloned()
    }

    fn cursor(&self) -> Position {
        self.cursor
    }

    fn apply_edit(&mut self, range: TextRange, text: &str, source: &str) -> Result<()> {
        if self.read_only {
            return Err(AssistError::Editor("buffer is read-only".to_string()));
        }

        let (start, end) = (range.start(), range.end());
        self.check_position(start)?;
        self.check_position(end)?;
        if end < start {
            return Err(AssistError::Editor(format!(
                "range end {}:{} precedes start {}:{}",
                end.line, end.column, start.line, start.column
            )));
        }

        let before = self.snapshot();
        self.history.before_edit(|| before);

        let first = &self.lines[start.line - 1];
        let last = &self.lines[end.line - 1];
        let mut replaced = String::with_capacity(first.len() + text.len() + last.len());
        replaced.push_str(&first[..byte_index(first, start.column)]);
        replaced.push_str(text);
        replaced.push_str(&last[byte_index(last, end.column)..]);

        self.lines
            .splice(start.line - 1..end.line, split_lines(&replaced));
        self.clamp_cursor();
        self.modified = true;
        self.edit_log.push(source.to_string());

        tracing::trace!(source, lines = self.lines.len(), "buffer edited");
        self.notify(EditorEvent::ContentChanged {
            source: source.to_string(),
        });
        Ok(())
    }

    fn push_undo_stop(&mut self) {
        self.history.push_stop();
    }

    fn set_decorations(&mut self, decorations: Vec<Decoration>) {
        self.decorations = decorations;
    }

    fn diagnostics(&self) -> Vec<Diagnostic> {
        self.linter.lint(&self.content(), &self.language.id)
    }

    fn language_id(&self) -> String {
        self.language.id.clone()
    }

    fn language_name(&self) -> String {
        self.language.name.clone()
    }

    fn file_extension(&self) -> String {
        self.language.extension.clone()
    }
}
