// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Editor host abstraction
//!
//! The orchestration components never talk to a concrete editor widget. They
//! go through [`EditorHost`], which exposes line/column addressing, range
//! edits, undo stops, inline decorations and diagnostics. [`TextBuffer`] is
//! the in-memory implementation used by the CLI and the tests.

pub mod buffer;
pub mod diagnostics;
pub mod undo;

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::Result;

pub use buffer::TextBuffer;
pub use diagnostics::{DelimiterLinter, Diagnostic, LineError, Linter, Severity};

/// 1-based position in a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// 1-based, end-exclusive range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRange {
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl TextRange {
    pub fn new(start_line: usize, start_column: usize, end_line: usize, end_column: usize) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    /// Empty range at `position`
    pub fn at(position: Position) -> Self {
        Self::new(position.line, position.column, position.line, position.column)
    }

    pub fn start(&self) -> Position {
        Position::new(self.start_line, self.start_column)
    }

    pub fn end(&self) -> Position {
        Position::new(self.end_line, self.end_column)
    }
}

/// Inline text rendered after the end of a line without being part of the
/// buffer content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoration {
    pub line: usize,
    pub after_text: String,
    pub class: String,
}

/// Key press as seen by the suggestion engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Tab,
    Enter,
    Escape,
    Char(char),
    Other,
}

/// Key press with the modifier the engine cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub key: Key,
    pub ctrl: bool,
}

impl KeyInput {
    pub fn plain(key: Key) -> Self {
        Self { key, ctrl: false }
    }

    pub fn ctrl(key: Key) -> Self {
        Self { key, ctrl: true }
    }
}

impl From<crossterm::event::KeyEvent> for KeyInput {
    fn from(event: crossterm::event::KeyEvent) -> Self {
        use crossterm::event::{KeyCode, KeyModifiers};

        let key = match event.code {
            KeyCode::Tab => Key::Tab,
            KeyCode::Enter => Key::Enter,
            KeyCode::Esc => Key::Escape,
            KeyCode::Char(c) => Key::Char(c),
            _ => Key::Other,
        };
        Self {
            key,
            ctrl: event.modifiers.contains(KeyModifiers::CONTROL),
        }
    }
}

/// Notifications a host forwards to the suggestion engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    /// Buffer content changed; `source` names who made the edit
    ContentChanged { source: String },
    /// Cursor moved to a 1-based line
    CursorMoved { line: usize },
    /// Mouse movement or click
    PointerActivity,
    /// Key press
    Key(KeyInput),
}

/// The code editor collaborator
pub trait EditorHost: Send {
    /// Full buffer content
    fn content(&self) -> String;

    /// Number of lines (at least 1)
    fn line_count(&self) -> usize;

    /// Content of a 1-based line
    fn line_content(&self, line: usize) -> Option<String>;

    /// Current cursor position
    fn cursor(&self) -> Position;

    /// Replace `range` with `text`. `source` identifies the edit in change
    /// notifications.
    fn apply_edit(&mut self, range: TextRange, text: &str, source: &str) -> Result<()>;

    /// Close the current undoable unit
    fn push_undo_stop(&mut self);

    /// Replace all inline decorations
    fn set_decorations(&mut self, decorations: Vec<Decoration>);

    /// Diagnostics for the current content
    fn diagnostics(&self) -> Vec<Diagnostic>;

    /// Language identifier, e.g. "rust"
    fn language_id(&self) -> String;

    /// Human-readable language name, e.g. "Rust"
    fn language_name(&self) -> String;

    /// File extension without the dot, e.g. "rs"
    fn file_extension(&self) -> String;

    /// Column one past the last character of `line`
    fn line_max_column(&self, line: usize) -> usize {
        self.line_content(line)
            .map(|l| l.chars().count() + 1)
            .unwrap_or(1)
    }

    /// Range covering the whole buffer
    fn full_range(&self) -> TextRange {
        let last = self.line_count();
        TextRange::new(1, 1, last, self.line_max_column(last))
    }

    /// Replace the whole buffer as one edit
    fn replace_all(&mut self, text: &str, source: &str) -> Result<()> {
        let range = self.full_range();
        self.apply_edit(range, text, source)
    }
}

/// Editor handle shared between the host and the orchestration components.
/// Guards are never held across an `.await`.
pub type SharedEditor = Arc<Mutex<dyn EditorHost>>;

/// Wrap an editor for sharing
pub fn shared<E: EditorHost + 'static>(editor: E) -> SharedEditor {
    Arc::new(Mutex::new(editor))
}

/// Lock a shared editor, recovering from poisoning
pub fn lock_editor(editor: &SharedEditor) -> MutexGuard<'_, dyn EditorHost + 'static> {
    match editor.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Editor lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Language metadata derived from a file extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Language {
    pub id: String,
    pub name: String,
    pub extension: String,
}

impl Language {
    /// Look up a language by file extension, falling back to plain text
    pub fn from_extension(extension: &str) -> Self {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        let (id, name) = match extension.as_str() {
            "rs" => ("rust", "Rust"),
            "py" => ("python", "Python"),
            "js" | "mjs" | "cjs" => ("javascript", "JavaScript"),
            "ts" => ("typescript", "TypeScript"),
            "java" => ("java", "Java"),
            "c" | "h" => ("c", "C"),
            "cpp" | "cc" | "cxx" | "hpp" => ("cpp", "C++"),
            "cs" => ("csharp", "C#"),
            "php" => ("php", "PHP"),
            "rb" => ("ruby", "Ruby"),
            "swift" => ("swift", "Swift"),
            "go" => ("go", "Go"),
            "kt" => ("kotlin", "Kotlin"),
            "scala" => ("scala", "Scala"),
            _ => ("plaintext", "Plain Text"),
        };
        Self {
            id: id.to_string(),
            name: name.to_string(),
            extension,
        }
    }

    /// Look up a language from a file path
    pub fn from_path(path: &std::path::Path) -> Self {
        Self::from_extension(
            path.extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default(),
        )
    }
}

impl Default for Language {
    fn default() -> Self {
        Self::from_extension("txt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    #[test]
    fn test_language_from_extension() {
        let rust = Language::from_extension("rs");
        assert_eq!(rust.id, "rust");
        assert_eq!(rust.name, "Rust");

        let py = Language::from_extension(".PY");
        assert_eq!(py.id, "python");
        assert_eq!(py.extension, "py");

        assert_eq!(Language::from_extension("zzz").id, "plaintext");
    }

    #[test]
    fn test_language_from_path() {
        let lang = Language::from_path(std::path::Path::new("src/main.go"));
        assert_eq!(lang.name, "Go");
        assert_eq!(Language::from_path(std::path::Path::new("Makefile")).id, "plaintext");
    }

    #[test]
    fn test_key_input_from_crossterm() {
        let tab: KeyInput = KeyEvent::new(KeyCode::Tab, KeyModifiers::NONE).into();
        assert_eq!(tab, KeyInput::plain(Key::Tab));

        let ctrl_k: KeyInput = KeyEvent::new(KeyCode::Char('k'), KeyModifiers::CONTROL).into();
        assert_eq!(ctrl_k, KeyInput::ctrl(Key::Char('k')));

        let f1: KeyInput = KeyEvent::new(KeyCode::F(1), KeyModifiers::NONE).into();
        assert_eq!(f1.key, Key::Other);
    }

    #[test]
    fn test_text_range_at() {
        let range = TextRange::at(Position::new(3, 4));
        assert_eq!(range.start(), range.end());
        assert_eq!(range.start_line, 3);
    }
}
