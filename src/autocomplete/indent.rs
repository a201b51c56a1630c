// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Indentation shaping for multi-line suggestions
//!
//! Suggestion lines are snapped to 4-space levels, the syntactic level of the
//! surrounding block is stripped, and the cursor line's own indentation is
//! put in front of every line.

use std::sync::OnceLock;

use regex::Regex;

const INDENT_UNIT: &str = "    ";

fn block_start_regex(language_id: &str) -> Option<&'static Regex> {
    static COLON: OnceLock<Regex> = OnceLock::new();
    static BRACE: OnceLock<Regex> = OnceLock::new();
    static RUBY: OnceLock<Regex> = OnceLock::new();

    let (cell, pattern) = match language_id {
        "python" => (&COLON, r":\s*$"),
        "ruby" => (&RUBY, r"(?:do|\{)\s*$"),
        "javascript" | "typescript" | "java" | "c" | "cpp" | "csharp" | "php" | "swift" | "go"
        | "rust" | "kotlin" | "scala" => (&BRACE, r"\{\s*$"),
        _ => return None,
    };
    Some(cell.get_or_init(|| Regex::new(pattern).expect("valid block start regex")))
}

/// Whether `line` opens a block in `language_id`
pub fn ends_with_block_start(line: &str, language_id: &str) -> bool {
    block_start_regex(language_id).is_some_and(|re| re.is_match(line.trim()))
}

fn leading_whitespace(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

/// Indentation of the cursor line and syntactic nesting level around it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndentContext {
    /// Leading whitespace of the cursor line, copied onto each suggestion line
    pub current_indent: String,
    /// Nesting level in 4-space units
    pub level: usize,
}

impl IndentContext {
    /// Derive the context from the lines up to and including the cursor line.
    ///
    /// The level comes from the closest non-blank line: its indentation in
    /// 4-space units, plus one when it opens a block.
    pub fn compute(lines_to_cursor: &[String], language_id: &str) -> Self {
        let current_indent = lines_to_cursor
            .last()
            .map(|line| leading_whitespace(line).to_string())
            .unwrap_or_default();

        let level = lines_to_cursor
            .iter()
            .rev()
            .find(|line| !line.trim().is_empty())
            .map(|line| {
                let base = leading_whitespace(line).chars().count() / 4;
                if ends_with_block_start(line, language_id) {
                    base + 1
                } else {
                    base
                }
            })
            .unwrap_or(0);

        Self {
            current_indent,
            level,
        }
    }

    /// Turn raw provider text into the lines to display
    pub fn shape(&self, suggestion: &str) -> Vec<String> {
        let final_indent = INDENT_UNIT.repeat(self.level);

        suggestion
            .split('\n')
            .map(|line| {
                let spaces = line.len() - line.trim_start_matches(' ').len();
                let normalized = format!("{}{}", INDENT_UNIT.repeat(spaces / 4), line.trim_start());
                let stripped = normalized
                    .strip_prefix(final_indent.as_str())
                    .unwrap_or(normalized.as_str());
                format!("{}{}", self.current_indent, stripped)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.split('\n').map(str::to_string).collect()
    }

    #[test]
    fn test_block_start_per_language() {
        assert!(ends_with_block_start("fn main() {", "rust"));
        assert!(ends_with_block_start("def f():  ", "python"));
        assert!(ends_with_block_start("items.each do", "ruby"));
        assert!(!ends_with_block_start("let x = 1;", "rust"));
        assert!(!ends_with_block_start("fn main() {", "plaintext"));
    }

    #[test]
    fn test_context_from_comment_inside_block() {
        let context = IndentContext::compute(
            &lines("fn main() {\n    // print hello"),
            "rust",
        );
        assert_eq!(context.current_indent, "    ");
        assert_eq!(context.level, 1);
    }

    #[test]
    fn test_context_skips_blank_lines() {
        let context = IndentContext::compute(&lines("def f():\n\n"), "python");
        assert_eq!(context.current_indent, "");
        assert_eq!(context.level, 1);
    }

    #[test]
    fn test_shape_reindents_under_current_line() {
        let context = IndentContext {
            current_indent: "    ".to_string(),
            level: 1,
        };
        let shaped = context.shape("    let x = 1;\n      if x {\n        y();");
        assert_eq!(
            shaped,
            vec!["    let x = 1;", "    if x {", "        y();"]
        );
    }

    #[test]
    fn test_shape_at_top_level() {
        let context = IndentContext::default();
        assert_eq!(context.shape("a\n  b\n    c"), vec!["a", "b", "    c"]);
    }
}
