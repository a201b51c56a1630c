// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Diagnostic markers and the linters that produce them

use serde::{Deserialize, Serialize};

/// Marker severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

/// Issue attached to a line of the buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub message: String,
    pub severity: Severity,
}

impl Diagnostic {
    pub fn error(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Error-severity marker reduced to what prompts and results report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineError {
    pub line: usize,
    pub message: String,
}

impl From<&Diagnostic> for LineError {
    fn from(diagnostic: &Diagnostic) -> Self {
        Self {
            line: diagnostic.line,
            message: diagnostic.message.clone(),
        }
    }
}

/// Keep only error-severity markers
pub fn errors_only(diagnostics: &[Diagnostic]) -> Vec<LineError> {
    diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(LineError::from)
        .collect()
}

/// Static analysis run over buffer content
pub trait Linter: Send + Sync {
    fn lint(&self, content: &str, language_id: &str) -> Vec<Diagnostic>;
}

/// Linter that never reports anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLinter;

impl Linter for NoopLinter {
    fn lint(&self, _content: &str, _language_id: &str) -> Vec<Diagnostic> {
        Vec::new()
    }
}

/// Reports unbalanced `()`, `[]` and `{}` outside strings and comments
#[derive(Debug, Default, Clone, Copy)]
pub struct DelimiterLinter;

struct Syntax {
    line_comment: &'static str,
    block_comments: bool,
    quotes: &'static [char],
}

fn syntax_for(language_id: &str) -> Syntax {
    match language_id {
        "python" => Syntax {
            line_comment: "#",
            block_comments: false,
            quotes: &['"', '\''],
        },
        "ruby" => Syntax {
            line_comment: "#",
            block_comments: false,
            quotes: &['"', '\''],
        },
        // Single quotes also start lifetimes
        "rust" => Syntax {
            line_comment: "//",
            block_comments: true,
            quotes: &['"'],
        },
        "javascript" | "typescript" => Syntax {
            line_comment: "//",
            block_comments: true,
            quotes: &['"', '\'', '`'],
        },
        _ => Syntax {
            line_comment: "//",
            block_comments: true,
            quotes: &['"', '\''],
        },
    }
}

fn closer_for(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

impl Linter for DelimiterLinter {
    fn lint(&self, content: &str, language_id: &str) -> Vec<Diagnostic> {
        if language_id == "plaintext" {
            return Vec::new();
        }

        let syntax = syntax_for(language_id);
        let mut diagnostics = Vec::new();
        let mut open: Vec<(char, usize)> = Vec::new();
        let mut in_block_comment = false;
        let mut in_string: Option<char> = None;

        for (index, line) in content.split('\n').enumerate() {
            let line_number = index + 1;
            let chars: Vec<char> = line.chars().collect();
            let mut i = 0;

            // Template literals span lines; other strings end with the line
            if in_string.is_some_and(|q| q != '`') {
                in_string = None;
            }

            while i < chars.len() {
                let c = chars[i];
                let next = chars.get(i + 1).copied();

                if in_block_comment {
                    if c == '*' && next == Some('/') {
                        in_block_comment = false;
                        i += 1;
                    }
                } else if let Some(quote) = in_string {
                    if c == '\\' {
                        i += 1;
                    } else if c == quote {
                        in_string = None;
                    }
                } else if line[char_offset(line, i)..].starts_with(syntax.line_comment) {
                    break;
                } else if syntax.block_comments && c == '/' && next == Some('*') {
                    in_block_comment = true;
                    i += 1;
                } else if syntax.quotes.contains(&c) {
                    in_string = Some(c);
                } else if matches!(c, '(' | '[' | '{') {
                    open.push((c, line_number));
                } else if matches!(c, ')' | ']' | '}') {
                    match open.last() {
                        Some(&(opener, _)) if closer_for(opener) == c => {
                            open.pop();
                        }
                        Some(&(opener, opened_at)) => {
                            diagnostics.push(Diagnostic::error(
                                line_number,
                                format!(
                                    "Mismatched '{}': expected '{}' to close '{}' from line {}",
                                    c,
                                    closer_for(opener),
                                    opener,
                                    opened_at
                                ),
                            ));
                            open.pop();
                        }
                        None => diagnostics.push(Diagnostic::error(
                            line_number,
                            format!("Unexpected closing '{}'", c),
                        )),
                    }
                }
                i += 1;
            }
        }

        for (opener, line) in open {
            diagnostics.push(Diagnostic::error(
                line,
                format!("Unclosed '{}'", opener),
            ));
        }

        if in_block_comment {
            let last = content.split('\n').count();
            diagnostics.push(Diagnostic {
                line: last,
                message: "Unterminated block comment".to_string(),
                severity: Severity::Warning,
            });
        }

        diagnostics.sort_by_key(|d| d.line);
        diagnostics
    }
}

/// Byte offset of the `index`-th character
fn char_offset(line: &str, index: usize) -> usize {
    line.char_indices()
        .nth(index)
        .map(|(offset, _)| offset)
        .unwrap_or(line.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_code_is_clean() {
        let code = "fn main() {\n    let v = vec![1, 2];\n    println!(\"{}\", v[0]);\n}";
        assert!(DelimiterLinter.lint(code, "rust").is_empty());
    }

    #[test]
    fn test_unclosed_brace_reported_on_opening_line() {
        let diagnostics = DelimiterLinter.lint("fn main() {\n    let x = 1;", "rust");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].line, 1);
        assert!(diagnostics[0].message.contains("Unclosed '{'"));
        assert!(diagnostics[0].is_error());
    }

    #[test]
    fn test_unexpected_closer() {
        let diagnostics = DelimiterLinter.lint("x = 1)\n", "python");
        assert_eq!(diagnostics[0].line, 1);
        assert!(diagnostics[0].message.contains("Unexpected closing ')'"));
    }

    #[test]
    fn test_mismatched_closer() {
        let diagnostics = DelimiterLinter.lint("let a = [1, 2);", "javascript");
        assert!(diagnostics[0].message.contains("Mismatched ')'"));
    }

    #[test]
    fn test_delimiters_in_strings_and_comments_ignored() {
        let code = "// {\nlet s = \"(\";\n/* [\n*/\nlet t = '}';";
        assert!(DelimiterLinter.lint(code, "javascript").is_empty());

        let py = "# (\nx = ')'";
        assert!(DelimiterLinter.lint(py, "python").is_empty());
    }

    #[test]
    fn test_rust_lifetimes_do_not_open_strings() {
        let code = "fn f<'a>(x: &'a str) -> &'a str { x }";
        assert!(DelimiterLinter.lint(code, "rust").is_empty());
    }

    #[test]
    fn test_plaintext_not_linted() {
        assert!(DelimiterLinter.lint("(((", "plaintext").is_empty());
    }

    #[test]
    fn test_errors_only_filters_severity() {
        let diagnostics = vec![
            Diagnostic::error(2, "bad"),
            Diagnostic {
                line: 3,
                message: "meh".to_string(),
                severity: Severity::Warning,
            },
        ];
        assert_eq!(
            errors_only(&diagnostics),
            vec![LineError {
                line: 2,
                message: "bad".to_string()
            }]
        );
    }
}
