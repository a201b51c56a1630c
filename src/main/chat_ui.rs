// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::io::{self, Write};
use std::path::PathBuf;

use crossterm::{
    style::{Color, ResetColor, SetForegroundColor},
    ExecutableCommand,
};
use futures::StreamExt;

use codeassist::chat::{
    compose_message, error_message, extract_code_blocks, ChatSession, RequestSlot, ReplySegment,
};
use codeassist::cli::ChatArgs;
use codeassist::config::{PersistedState, Settings};
use codeassist::error::{AssistError, Result};
use codeassist::llm::message::{ChatTurn, Role};
use codeassist::llm::provider::LlmProvider;

use super::cli_commands::{load_attachments, provider_for};

/// Run the interactive chat loop
pub(super) async fn run_chat(args: ChatArgs, settings: Settings) -> Result<()> {
    let state = PersistedState::load()?;
    let provider = provider_for(&args.provider, &settings, &state)?;
    let session = ChatSession::builder(provider.clone())
        .with_settings(&settings)
        .build();
    let slot = RequestSlot::new();
    let mut attachments = load_attachments(&args.attach)?;

    print_welcome(provider.as_ref(), attachments.len())?;

    while let Some(input) = read_user_input()? {
        match input.as_str() {
            "" => continue,
            "exit" | "quit" => break,
            "/help" => print_help()?,
            "/clear" => {
                session.clear_history();
                println!("History cleared.");
            }
            "/history" => print_history(&session.turns())?,
            command if command.starts_with("/save") => {
                if let Err(e) = save_code_block(&session.turns(), command) {
                    print_error(&format!("Error: {}", e))?;
                }
            }
            _ => {
                let prompt = compose_message(&attachments, &input);
                if stream_reply(&session, &slot, &prompt).await? {
                    attachments.clear();
                    print_code_block_hint(&session.turns())?;
                }
            }
        }
    }

    Ok(())
}

/// Stream the reply to `prompt` onto stdout. Ctrl-C cancels the request
/// quietly. Returns whether the reply arrived in full.
pub(super) async fn stream_reply(
    session: &ChatSession,
    slot: &RequestSlot,
    prompt: &str,
) -> Result<bool> {
    let cancel = slot.renew();

    let send = session.send(prompt, cancel);
    tokio::pin!(send);
    let sent = loop {
        tokio::select! {
            result = &mut send => break result,
            _ = tokio::signal::ctrl_c() => slot.cancel(),
        }
    };

    let mut stream = match sent {
        Ok(stream) => stream,
        Err(e) => {
            report_failure(&e)?;
            return Ok(false);
        }
    };

    print_response_prefix(session.provider().as_ref())?;
    let mut stdout = io::stdout();
    loop {
        tokio::select! {
            chunk = stream.next() => match chunk {
                Some(Ok(text)) => {
                    print!("{}", text);
                    stdout.flush()?;
                }
                Some(Err(e)) => {
                    println!();
                    report_failure(&e)?;
                    return Ok(false);
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => slot.cancel(),
        }
    }

    // Keep output consistent: always terminate with a newline.
    println!();
    Ok(true)
}

fn report_failure(error: &AssistError) -> Result<()> {
    match error_message(error) {
        Some(message) => print_error(&message),
        None => {
            tracing::debug!("chat request cancelled");
            Ok(())
        }
    }
}

/// Print a red error line to stderr
pub(super) fn print_error(message: &str) -> Result<()> {
    let mut stderr = io::stderr();
    stderr.execute(SetForegroundColor(Color::Red))?;
    eprintln!("{}", message);
    stderr.execute(ResetColor)?;
    Ok(())
}

/// Print welcome message
fn print_welcome(provider: &dyn LlmProvider, attached: usize) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Cyan))?;
    println!("codeassist v{}", env!("CARGO_PKG_VERSION"));
    stdout.execute(ResetColor)?;
    println!("Provider: {}", provider.name());
    println!("Model: {}", provider.model_display_name(&provider.model()));
    if attached > 0 {
        println!("Attached: {} code block(s), sent with your first message", attached);
    }
    println!("Type /help for commands, exit to quit\n");
    Ok(())
}

/// Print help message
fn print_help() -> Result<()> {
    println!("\nCommands:");
    println!("  /history       - Show the turns kept in history");
    println!("  /clear         - Clear conversation history");
    println!("  /save N FILE   - Write code block N of the last reply to FILE");
    println!("  /help          - Show this help message");
    println!("  exit           - Exit codeassist");
    println!("\nTip: Press Ctrl+C to cancel a reply without exiting.");
    println!();
    Ok(())
}

/// Read user input. `None` at end of input.
fn read_user_input() -> Result<Option<String>> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Green))?;
    print!("you: ");
    stdout.execute(ResetColor)?;
    stdout.flush()?;

    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        println!();
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}

fn print_response_prefix(provider: &dyn LlmProvider) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Blue))?;
    print!("{}: ", provider.name());
    stdout.execute(ResetColor)?;
    stdout.flush()?;
    Ok(())
}

fn print_history(turns: &[ChatTurn]) -> Result<()> {
    if turns.is_empty() {
        println!("No history yet.");
        return Ok(());
    }
    let mut stdout = io::stdout();
    for turn in turns {
        let color = match turn.role {
            Role::User => Color::Green,
            Role::Assistant => Color::Blue,
            Role::System => Color::DarkGrey,
        };
        stdout.execute(SetForegroundColor(color))?;
        print!("[{}] ", turn.role.as_str());
        stdout.execute(ResetColor)?;
        println!("{}", preview_line(&turn.content, 80));
    }
    Ok(())
}

fn preview_line(content: &str, max_chars: usize) -> String {
    let first = content.lines().next().unwrap_or_default();
    if first.chars().count() > max_chars || content.lines().nth(1).is_some() {
        let cut: String = first.chars().take(max_chars).collect();
        format!("{}...", cut)
    } else {
        first.to_string()
    }
}

fn last_reply_blocks(turns: &[ChatTurn]) -> Vec<(Option<String>, String)> {
    turns
        .iter()
        .rev()
        .find(|t| t.role == Role::Assistant)
        .map(|t| {
            extract_code_blocks(&t.content)
                .into_iter()
                .filter_map(|segment| match segment {
                    ReplySegment::Code { language, code } => Some((language, code)),
                    ReplySegment::Text(_) => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

fn print_code_block_hint(turns: &[ChatTurn]) -> Result<()> {
    let blocks = last_reply_blocks(turns);
    if blocks.is_empty() {
        return Ok(());
    }
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::DarkGrey))?;
    for (index, (language, code)) in blocks.iter().enumerate() {
        println!(
            "  [{}] {} block, {} line(s)",
            index + 1,
            language.as_deref().unwrap_or("plain"),
            code.lines().count()
        );
    }
    println!("  /save N FILE writes a block to disk");
    stdout.execute(ResetColor)?;
    Ok(())
}

fn save_code_block(turns: &[ChatTurn], command: &str) -> Result<()> {
    let mut parts = command.split_whitespace().skip(1);
    let (Some(index), Some(path)) = (parts.next(), parts.next()) else {
        return Err(AssistError::InvalidInput("usage: /save N FILE".to_string()));
    };
    let index: usize = index
        .parse()
        .map_err(|_| AssistError::InvalidInput(format!("'{}' is not a block number", index)))?;

    let blocks = last_reply_blocks(turns);
    let (_, code) = index
        .checked_sub(1)
        .and_then(|i| blocks.get(i))
        .ok_or_else(|| AssistError::InvalidInput(format!("No code block {}", index)))?;

    let path = PathBuf::from(path);
    std::fs::write(&path, format!("{}\n", code))?;
    println!("Saved block {} to {}", index, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_line_truncates() {
        assert_eq!(preview_line("short", 80), "short");
        assert_eq!(preview_line("first\nsecond", 80), "first...");
        assert_eq!(preview_line("abcdef", 3), "abc...");
    }

    #[test]
    fn test_last_reply_blocks() {
        let turns = vec![
            ChatTurn::user("write it"),
            ChatTurn::assistant("old\n```rust\nfn old() {}\n```"),
            ChatTurn::user("again"),
            ChatTurn::assistant("Sure:\n```py\nprint(1)\n```\nand\n```\nplain\n```"),
        ];
        let blocks = last_reply_blocks(&turns);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], (Some("py".to_string()), "print(1)".to_string()));
        assert_eq!(blocks[1].0, None);
    }

    #[test]
    fn test_save_code_block_writes_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("out.py");
        let turns = vec![ChatTurn::assistant("```py\nprint(1)\n```")];

        save_code_block(&turns, &format!("/save 1 {}", target.display())).unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "print(1)\n");

        assert!(save_code_block(&turns, "/save 2 x.py").is_err());
        assert!(save_code_block(&turns, "/save 0 x.py").is_err());
        assert!(save_code_block(&turns, "/save").is_err());
    }
}
