// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Attached code blocks, request routing and reply segmentation

use std::sync::OnceLock;

use regex::Regex;

/// Code the user attached to a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAttachment {
    pub language: String,
    pub code: String,
}

impl CodeAttachment {
    pub fn new(language: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            code: code.into(),
        }
    }

    /// Fenced markdown block
    pub fn to_markdown(&self) -> String {
        format!("```{}\n{}\n```", self.language, self.code)
    }
}

fn join_blocks(attachments: &[CodeAttachment]) -> String {
    attachments
        .iter()
        .map(CodeAttachment::to_markdown)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Chat prompt with attached blocks placed before the message
pub fn compose_message(attachments: &[CodeAttachment], message: &str) -> String {
    if attachments.is_empty() {
        return message.to_string();
    }
    format!("{}\n\n{}", join_blocks(attachments), message)
}

/// Composer request with attached blocks labelled as such
pub fn compose_request(attachments: &[CodeAttachment], message: &str) -> String {
    if attachments.is_empty() {
        return message.to_string();
    }
    format!("Attached code block:\n\n{}\n\n{}", join_blocks(attachments), message)
}

const MODIFICATION_KEYWORDS: &[&str] = &[
    "modify",
    "change",
    "update",
    "add",
    "remove",
    "delete",
    "create",
    "implement",
    "fix",
    "refactor",
    "rename",
    "move",
    "copy",
    "paste",
    "write",
    "code",
];

/// Whether a composer request is really a question for chat: nothing is
/// attached and no word asks for a change to the file
pub fn is_simple_question(message: &str, attachments: &[CodeAttachment]) -> bool {
    if !attachments.is_empty() {
        return false;
    }
    let lower = message.to_lowercase();
    !MODIFICATION_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Piece of an assistant reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplySegment {
    Text(String),
    Code { language: Option<String>, code: String },
}

fn code_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```([\w+]+)?\n([\s\S]*?)```").expect("valid code block regex"))
}

/// Split a reply into prose and fenced code blocks. Whitespace-only prose
/// between blocks is dropped.
pub fn extract_code_blocks(reply: &str) -> Vec<ReplySegment> {
    let mut segments = Vec::new();
    let mut last = 0;

    for captures in code_block_regex().captures_iter(reply) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        push_text(&mut segments, &reply[last..whole.start()]);
        segments.push(ReplySegment::Code {
            language: captures.get(1).map(|m| m.as_str().to_string()),
            code: captures
                .get(2)
                .map(|m| m.as_str().trim_end_matches('\n').to_string())
                .unwrap_or_default(),
        });
        last = whole.end();
    }
    push_text(&mut segments, &reply[last..]);
    segments
}

fn push_text(segments: &mut Vec<ReplySegment>, text: &str) {
    if !text.trim().is_empty() {
        segments.push(ReplySegment::Text(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_message_without_attachments() {
        assert_eq!(compose_message(&[], "hi"), "hi");
        assert_eq!(compose_request(&[], "hi"), "hi");
    }

    #[test]
    fn test_compose_message_with_attachments() {
        let attachments = vec![
            CodeAttachment::new("rs", "fn a() {}"),
            CodeAttachment::new("py", "pass"),
        ];
        assert_eq!(
            compose_message(&attachments, "explain"),
            "```rs\nfn a() {}\n```\n\n```py\npass\n```\n\nexplain"
        );
        assert!(compose_request(&attachments, "merge").starts_with("Attached code block:\n\n```rs"));
    }

    #[test]
    fn test_simple_question_routing() {
        assert!(is_simple_question("What does this function return?", &[]));
        assert!(!is_simple_question("Please Refactor the parser", &[]));
        assert!(!is_simple_question("what is this?", &[CodeAttachment::new("rs", "x")]));
    }

    #[test]
    fn test_extract_code_blocks() {
        let reply = "Here you go:\n```rust\nfn main() {}\n```\nAnd also\n```\nplain\n```";
        let segments = extract_code_blocks(reply);

        assert_eq!(
            segments,
            vec![
                ReplySegment::Text("Here you go:\n".to_string()),
                ReplySegment::Code {
                    language: Some("rust".to_string()),
                    code: "fn main() {}".to_string(),
                },
                ReplySegment::Text("\nAnd also\n".to_string()),
                ReplySegment::Code {
                    language: None,
                    code: "plain".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_extract_plain_reply() {
        assert_eq!(
            extract_code_blocks("just text"),
            vec![ReplySegment::Text("just text".to_string())]
        );
        assert!(extract_code_blocks("").is_empty());
    }
}
