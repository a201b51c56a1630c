// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! codeassist - AI coding assistant for your editor and terminal
//!
//! Entry point for the codeassist CLI application.

use clap::Parser;

use codeassist::cli::{ChatArgs, Cli, Commands};
use codeassist::config::Settings;
use codeassist::error::Result;

#[path = "main/chat_ui.rs"]
mod chat_ui;
#[path = "main/cli_commands.rs"]
mod cli_commands;

use chat_ui::run_chat;
use cli_commands::{
    run_ask, run_bugs, run_complete, run_compose, run_key_command, run_models, run_state_command,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    // `-v` turns on the crate's request lifecycle logs. `RUST_LOG` still applies.
    if cli.verbose > 0 {
        let directive = if cli.verbose > 1 {
            "codeassist=trace"
        } else {
            "codeassist=debug"
        };
        if let Ok(parsed) = directive.parse() {
            env_filter = env_filter.add_directive(parsed);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    // Load settings
    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    settings.validate()?;

    // Dispatch to appropriate command
    match cli.command {
        None => run_chat(ChatArgs::default(), settings).await?,
        Some(Commands::Chat(args)) => run_chat(args, settings).await?,
        Some(Commands::Ask(args)) => run_ask(args, settings).await?,
        Some(Commands::Compose(args)) => run_compose(args, settings).await?,
        Some(Commands::Bugs(args)) => run_bugs(args, settings).await?,
        Some(Commands::Complete(args)) => run_complete(args, settings).await?,
        Some(Commands::Key(args)) => run_key_command(args, settings).await?,
        Some(Commands::State(args)) => run_state_command(args)?,
        Some(Commands::Models(args)) => run_models(args, settings)?,
    }

    Ok(())
}
