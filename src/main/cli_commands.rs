// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crossterm::{
    style::{Color, ResetColor, SetForegroundColor, Stylize},
    ExecutableCommand,
};

use codeassist::autocomplete::SuggestionEngine;
use codeassist::bugfinder::{BugFinder, BugFinderOutcome};
use codeassist::chat::{
    compose_message, compose_request, is_simple_question, ChatSession, CodeAttachment,
    RequestSlot,
};
use codeassist::cli::{
    AskArgs, BugsArgs, CompleteArgs, ComposeArgs, KeyArgs, KeyCommands, ModelsArgs, ProviderArgs,
    StateArgs, StateCommands,
};
use codeassist::composer::{Composer, ComposerOutcome};
use codeassist::config::{PersistedState, Settings};
use codeassist::editor::{lock_editor, Language, Position, SharedEditor, TextBuffer};
use codeassist::error::{AssistError, Result};
use codeassist::llm::factory::{ProviderFactory, ProviderKind};
use codeassist::llm::provider::LlmProvider;

use super::chat_ui::{print_error, stream_reply};

/// Build the provider for a request subcommand. An explicit `--model` wins
/// over the model remembered with the key.
pub(super) fn provider_for(
    args: &ProviderArgs,
    settings: &Settings,
    state: &PersistedState,
) -> Result<Arc<dyn LlmProvider>> {
    let kind = ProviderFactory::resolve_kind(args.provider.as_deref(), settings, state)?;
    let provider = ProviderFactory::create(kind, settings, state)?;

    let remembered = state
        .last_model
        .as_deref()
        .filter(|_| state.last_service_type.as_deref() == Some(kind.as_str()));
    if let Some(model) = args.model.as_deref().or(remembered) {
        provider.set_model(model)?;
    }
    Ok(provider)
}

/// Read files into code attachments labelled with their language
pub(super) fn load_attachments(paths: &[PathBuf]) -> Result<Vec<CodeAttachment>> {
    paths
        .iter()
        .map(|path| {
            let code = std::fs::read_to_string(path)?;
            Ok(CodeAttachment::new(Language::from_path(path).id, code))
        })
        .collect()
}

fn open_buffer(path: &Path) -> Result<TextBuffer> {
    let content = std::fs::read_to_string(path)?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    Ok(TextBuffer::new(&content).with_extension(extension))
}

fn write_back(path: &Path, editor: &SharedEditor) -> Result<()> {
    let content = lock_editor(editor).content();
    std::fs::write(path, content)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn print_status(color: Color, message: &str) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(color))?;
    println!("{}", message);
    stdout.execute(ResetColor)?;
    Ok(())
}

fn print_code(title: &str, code: &str) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Cyan))?;
    println!("--- {} ---", title);
    stdout.execute(ResetColor)?;
    println!("{}", code);
    stdout.flush()?;
    Ok(())
}

/// Run `stop` when Ctrl-C arrives. Abort the returned handle once the
/// request is over.
fn stop_on_ctrl_c(stop: impl FnOnce() + Send + 'static) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop();
        }
    })
}

/// Run single question mode
pub(super) async fn run_ask(args: AskArgs, settings: Settings) -> Result<()> {
    let state = PersistedState::load()?;
    let provider = provider_for(&args.provider, &settings, &state)?;
    let attachments = load_attachments(&args.file)?;

    tracing::debug!(provider = provider.name(), files = attachments.len(), "ask");

    let session = ChatSession::builder(provider).with_settings(&settings).build();
    let slot = RequestSlot::new();
    stream_reply(&session, &slot, &compose_message(&attachments, &args.prompt)).await?;
    Ok(())
}

/// Rewrite a file through the composer
pub(super) async fn run_compose(args: ComposeArgs, settings: Settings) -> Result<()> {
    let state = PersistedState::load()?;
    let provider = provider_for(&args.provider, &settings, &state)?;
    let attachments = load_attachments(&args.attach)?;

    if is_simple_question(&args.request, &attachments) {
        tracing::debug!("request has no change keywords, answering in chat");
        let file = load_attachments(std::slice::from_ref(&args.file))?;
        let session = ChatSession::builder(provider).with_settings(&settings).build();
        let slot = RequestSlot::new();
        stream_reply(&session, &slot, &compose_message(&file, &args.request)).await?;
        return Ok(());
    }

    let editor: SharedEditor = Arc::new(Mutex::new(open_buffer(&args.file)?));
    let max_attempts = args.max_attempts.unwrap_or(settings.composer.max_attempts);
    let composer = Arc::new(
        Composer::new(Some(editor.clone()), provider).with_max_attempts(max_attempts),
    );

    print_status(Color::DarkGrey, "Composing changes...")?;
    let watcher = {
        let composer = composer.clone();
        stop_on_ctrl_c(move || composer.stop())
    };
    let outcome = composer
        .process_request(&compose_request(&attachments, &args.request))
        .await;
    watcher.abort();

    let summary = outcome.message().to_string();
    match outcome {
        ComposerOutcome::PreviewReady(preview) => {
            print_status(Color::Cyan, &summary)?;
            let title = format!(
                "proposed {} (attempt {})",
                preview.language(),
                preview.attempt().attempt_number
            );
            print_code(&title, preview.code())?;

            if !args.apply {
                println!("Run again with --apply to write the changes.");
                return Ok(());
            }

            let report = preview.apply()?;
            if report.success {
                print_status(Color::Green, &format!("✓ {}", report.message))?;
                write_back(&args.file, &editor)?;
            } else {
                print_error(&report.message)?;
                for error in &report.errors {
                    eprintln!("  line {}: {}", error.line, error.message);
                }
            }
        }
        ComposerOutcome::Stopped { message } => print_status(Color::Yellow, &message)?,
        ComposerOutcome::Failed { message, .. } => print_error(&message)?,
        ComposerOutcome::Busy => {}
    }
    Ok(())
}

/// Look for bugs in a file
pub(super) async fn run_bugs(args: BugsArgs, settings: Settings) -> Result<()> {
    let state = PersistedState::load()?;
    let provider = provider_for(&args.provider, &settings, &state)?;

    let editor: SharedEditor = Arc::new(Mutex::new(open_buffer(&args.file)?));
    let finder = Arc::new(BugFinder::new(Some(editor.clone()), provider));

    print_status(Color::DarkGrey, "Analyzing code for bugs...")?;
    let watcher = {
        let finder = finder.clone();
        stop_on_ctrl_c(move || finder.stop())
    };
    let outcome = finder.find_bugs(&args.input, &args.stdin).await;
    watcher.abort();

    match outcome {
        BugFinderOutcome::NoBugs { message } => print_status(Color::Green, &message)?,
        BugFinderOutcome::BugsFound(preview) => {
            print_status(Color::Yellow, preview.explanation())?;
            print_code(&format!("fixed {}", preview.language()), preview.code())?;

            if args.apply {
                let message = preview.apply()?;
                print_status(Color::Green, &format!("✓ {}", message))?;
                write_back(&args.file, &editor)?;
            } else {
                println!("Run again with --apply to write the fix.");
            }
        }
        BugFinderOutcome::Failed { message, .. } => print_error(&message)?,
        BugFinderOutcome::Busy => {}
    }
    Ok(())
}

/// Ask for an inline suggestion at a cursor position
pub(super) async fn run_complete(args: CompleteArgs, settings: Settings) -> Result<()> {
    let state = PersistedState::load()?;
    let provider = provider_for(&args.provider, &settings, &state)?;

    let mut buffer = open_buffer(&args.file)?;
    let line_count = buffer.lines().len();
    if args.line == 0 || args.line > line_count {
        return Err(AssistError::InvalidInput(format!(
            "Line {} is outside {} ({} lines)",
            args.line,
            args.file.display(),
            line_count
        )));
    }
    let column = args
        .column
        .unwrap_or_else(|| buffer.lines()[args.line - 1].chars().count() + 1);
    buffer.set_cursor(Position::new(args.line, column));

    let buffer = Arc::new(Mutex::new(buffer));
    let editor: SharedEditor = buffer.clone();
    let mut engine = SuggestionEngine::new(editor.clone(), provider, std::time::Instant::now())
        .with_config(&settings.autocomplete);

    let Some(request) = engine.request_now() else {
        println!("Cursor is not inside a comment; nothing to suggest.");
        return Ok(());
    };

    let reply = request.send().await;
    if let Err(e) = &reply.result {
        if !e.is_cancelled() {
            print_error(&format!("Error: {}", e))?;
        }
    }
    engine.on_reply(reply);

    if engine.suggestion().is_none() {
        println!("No suggestion.");
        return Ok(());
    }

    if args.accept {
        engine.accept_suggestion();
        if args.write {
            write_back(&args.file, &editor)?;
        } else {
            println!("{}", lock_editor(&editor).content());
        }
    } else {
        let rendered = {
            let buffer = buffer
                .lock()
                .map_err(|_| AssistError::Editor("buffer lock poisoned".to_string()))?;
            buffer.render_with(|text| text.dark_grey().to_string())
        };
        println!("{}", rendered);
        engine.clear_suggestion();
    }
    engine.dispose();
    Ok(())
}

fn mask_key(key: &str) -> String {
    let count = key.chars().count();
    if count <= 8 {
        return "****".to_string();
    }
    format!("****{}", key.chars().skip(count - 4).collect::<String>())
}

/// Manage remembered API keys
pub(super) async fn run_key_command(args: KeyArgs, settings: Settings) -> Result<()> {
    let mut state = PersistedState::load()?;

    match args.command {
        KeyCommands::Set {
            provider,
            key,
            model,
        } => {
            let kind: ProviderKind = provider.parse()?;
            let provider =
                ProviderFactory::connect(kind, &key, model.as_deref(), &settings, &mut state)
                    .await?;
            state.save()?;
            print_status(
                Color::Green,
                &format!(
                    "✓ {} key validated and saved (model {}).",
                    kind.display_name(),
                    provider.model()
                ),
            )?;
        }
        KeyCommands::Forget { provider } => {
            let kind: ProviderKind = provider.parse()?;
            if state.forget_key(kind.as_str()) {
                state.save()?;
                println!("Forgot the {} key.", kind.display_name());
            } else {
                println!("No {} key was remembered.", kind.display_name());
            }
        }
        KeyCommands::List => {
            for name in ProviderFactory::supported_providers() {
                let kind: ProviderKind = name.parse()?;
                let configured = match kind {
                    ProviderKind::OpenAi => settings.get_openai_api_key(),
                    ProviderKind::Anthropic => settings.get_anthropic_api_key(),
                };
                let source = if let Some(key) = configured {
                    format!("{} (settings or environment)", mask_key(&key))
                } else if let Some(key) = state.api_key(kind.as_str()) {
                    format!("{} (remembered)", mask_key(&key))
                } else {
                    "not configured".to_string()
                };
                let current = state.last_service_type.as_deref() == Some(kind.as_str());
                println!(
                    "{} {:<10} {}",
                    if current { "*" } else { " " },
                    kind.as_str(),
                    source
                );
            }
        }
    }
    Ok(())
}

/// Show or clear the remembered state
pub(super) fn run_state_command(args: StateArgs) -> Result<()> {
    let path = PersistedState::default_path();

    match args.command {
        StateCommands::Show => {
            let mut state = PersistedState::load_from(&path)?;
            for (name, value) in state.entries.iter_mut() {
                if let (true, Some(key)) = (name.ends_with("_api_key"), value.as_str()) {
                    *value = serde_json::Value::String(mask_key(key));
                }
            }
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        StateCommands::Clear => {
            if path.exists() {
                std::fs::remove_file(&path)?;
                println!("Cleared {}", path.display());
            } else {
                println!("Nothing to clear.");
            }
        }
    }
    Ok(())
}

/// List the models a provider offers
pub(super) fn run_models(args: ModelsArgs, settings: Settings) -> Result<()> {
    let state = PersistedState::load()?;
    let kind = ProviderFactory::resolve_kind(args.provider.as_deref(), &settings, &state)?;
    let default = ProviderFactory::default_model(kind, &settings);

    println!("{} models:", kind.display_name());
    for model in ProviderFactory::models(kind) {
        let marker = if model.id == default { "*" } else { " " };
        println!(
            "{} {:<28} {:<16} {}",
            marker, model.id, model.display_name, model.description
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("short"), "****");
        assert_eq!(mask_key("sk-abcdefgh1234"), "****1234");
    }

    #[test]
    fn test_load_attachments_labels_language() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("lib.rs");
        std::fs::write(&path, "fn a() {}").unwrap();

        let attachments = load_attachments(&[path]).unwrap();
        assert_eq!(attachments, vec![CodeAttachment::new("rust", "fn a() {}")]);
        assert!(load_attachments(&[dir.path().join("missing.rs")]).is_err());
    }

    #[test]
    fn test_open_buffer_uses_extension() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("main.py");
        std::fs::write(&path, "print(1)\n").unwrap();

        let buffer = open_buffer(&path).unwrap();
        assert_eq!(codeassist::editor::EditorHost::language_id(&buffer), "python");
        assert_eq!(codeassist::editor::EditorHost::content(&buffer), "print(1)\n");
    }

    #[test]
    fn test_provider_for_prefers_explicit_model() {
        let mut settings = Settings::default();
        settings.providers.openai.api_key_env = "CODEASSIST_TEST_NO_OPENAI_KEY".to_string();
        let mut state = PersistedState::default();
        state.remember_key("openai", "sk-test", Some("gpt-4o"));

        let remembered = provider_for(&ProviderArgs::default(), &settings, &state).unwrap();
        assert_eq!(remembered.model(), "gpt-4o");

        let args = ProviderArgs {
            provider: Some("openai".to_string()),
            model: Some("o3-mini".to_string()),
        };
        assert_eq!(provider_for(&args, &settings, &state).unwrap().model(), "o3-mini");
    }
}
