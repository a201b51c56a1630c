// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Comment detection at the cursor
//!
//! Suggestions are only requested from inside comments. Detection is textual
//! and language-agnostic: `//` line comments and C-style block comments.

use crate::editor::Position;

/// Whether `line` is a line comment or looks like part of a block comment
pub fn is_comment_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with("//") || trimmed.starts_with("/*") || trimmed.starts_with('*')
}

/// Whether `cursor` sits inside a `/* ... */` span.
///
/// Scans backward from the cursor line: a `*/` seen before any `/*` means
/// the span already closed. A `*/` before the cursor on its own line also
/// closes it.
pub fn is_in_block_comment(lines: &[String], cursor: Position) -> bool {
    let last = cursor.line.min(lines.len());
    let mut found_start = false;

    for line in lines[..last].iter().rev() {
        if line.contains("*/") {
            return false;
        }
        if line.contains("/*") {
            found_start = true;
            break;
        }
    }
    if !found_start {
        return false;
    }

    let Some(current) = lines.get(cursor.line.saturating_sub(1)) else {
        return false;
    };
    let before_cursor: String = current.chars().take(cursor.column.saturating_sub(1)).collect();
    !before_cursor.contains("*/")
}

/// Comment gate for suggestion requests. `lines` holds at least the lines up
/// to and including the cursor line.
pub fn cursor_in_comment(lines: &[String], cursor: Position) -> bool {
    let current = lines
        .get(cursor.line.saturating_sub(1))
        .map(String::as_str)
        .unwrap_or_default();
    is_comment_line(current) || is_in_block_comment(lines, cursor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.split('\n').map(str::to_string).collect()
    }

    #[test]
    fn test_line_comments() {
        assert!(is_comment_line("    // todo"));
        assert!(is_comment_line("/* start"));
        assert!(is_comment_line(" * middle"));
        assert!(!is_comment_line("let x = 1; // trailing"));
        assert!(!is_comment_line(""));
    }

    #[test]
    fn test_inside_open_block_comment() {
        let text = lines("/*\nsort the list\nby name");
        assert!(is_in_block_comment(&text, Position::new(3, 3)));
        assert!(cursor_in_comment(&text, Position::new(2, 1)));
    }

    #[test]
    fn test_after_closed_block_comment() {
        let text = lines("/* header */\nlet x = 1;");
        assert!(!is_in_block_comment(&text, Position::new(2, 5)));
        assert!(!cursor_in_comment(&text, Position::new(2, 5)));

        let closed = lines("/*\nnote\n*/\nfn main() {}");
        assert!(!cursor_in_comment(&closed, Position::new(4, 1)));
    }

    #[test]
    fn test_code_line_is_not_comment() {
        let text = lines("fn main() {\n    let v = 3;\n}");
        for line in 1..=3 {
            assert!(!cursor_in_comment(&text, Position::new(line, 1)));
        }
    }

    #[test]
    fn test_cursor_past_buffer_end() {
        let text = lines("// only");
        assert!(!is_in_block_comment(&text, Position::new(5, 1)));
        assert!(!cursor_in_comment(&text, Position::new(5, 1)));
    }
}
