// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Undo/redo history for the text buffer
//!
//! Edits between two undo stops form one undoable unit. The snapshot taken
//! before the first edit of a unit stays open until the next stop.

use super::Position;

/// Maximum number of undo units to keep
const MAX_UNDO_HISTORY: usize = 100;

/// A snapshot of buffer state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferSnapshot {
    /// The text content
    pub content: String,
    /// Cursor position
    pub cursor: Position,
}

/// Undo/redo history manager
#[derive(Debug, Default)]
pub struct UndoStack {
    /// Closed units (for undo)
    undo_stack: Vec<BufferSnapshot>,
    /// Undone units (for redo)
    redo_stack: Vec<BufferSnapshot>,
    /// State before the first edit of the unit in progress
    open: Option<BufferSnapshot>,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the state about to be changed. Only the first edit after a
    /// stop is captured; later edits join the same unit.
    pub fn before_edit(&mut self, current: impl FnOnce() -> BufferSnapshot) {
        if self.open.is_none() {
            self.open = Some(current());
            self.redo_stack.clear();
        }
    }

    /// Close the unit in progress
    pub fn push_stop(&mut self) {
        if let Some(snapshot) = self.open.take() {
            if self.undo_stack.len() >= MAX_UNDO_HISTORY {
                self.undo_stack.remove(0);
            }
            self.undo_stack.push(snapshot);
        }
    }

    /// Undo: close the open unit, then return the state to restore
    pub fn undo(&mut self, current: BufferSnapshot) -> Option<BufferSnapshot> {
        self.push_stop();
        let snapshot = self.undo_stack.pop()?;
        self.redo_stack.push(current);
        Some(snapshot)
    }

    /// Redo: return the state to restore, or None if nothing was undone
    pub fn redo(&mut self, current: BufferSnapshot) -> Option<BufferSnapshot> {
        let snapshot = self.redo_stack.pop()?;
        self.undo_stack.push(current);
        Some(snapshot)
    }

    pub fn can_undo(&self) -> bool {
        self.open.is_some() || !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Number of undoable units, counting the open one
    pub fn undo_count(&self) -> usize {
        self.undo_stack.len() + usize::from(self.open.is_some())
    }
}
