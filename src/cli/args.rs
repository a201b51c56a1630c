// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap
//!
//! Defines all command-line arguments and subcommands for codeassist.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// codeassist - chat, compose, bug-fix and inline suggestions from the terminal
#[derive(Parser, Debug)]
#[command(name = "codeassist")]
#[command(version, about = "AI coding assistant for your editor and terminal")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Settings file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive chat session (default when no command given)
    Chat(ChatArgs),

    /// Ask a single question (non-interactive)
    Ask(AskArgs),

    /// Rewrite a file according to a request, checking the result for errors
    Compose(ComposeArgs),

    /// Look for bugs in a file and propose a fix
    Bugs(BugsArgs),

    /// Suggest code for the comment at a cursor position
    Complete(CompleteArgs),

    /// Manage remembered API keys
    Key(KeyArgs),

    /// Show or clear the state remembered between runs
    State(StateArgs),

    /// List the models a provider offers
    Models(ModelsArgs),
}

/// Provider selection shared by the request subcommands
#[derive(clap::Args, Debug, Default, Clone)]
pub struct ProviderArgs {
    /// LLM provider to use (openai, anthropic)
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Model to use
    #[arg(short, long)]
    pub model: Option<String>,
}

/// Arguments for the chat subcommand
#[derive(clap::Args, Debug, Default)]
pub struct ChatArgs {
    #[command(flatten)]
    pub provider: ProviderArgs,

    /// Files attached as code blocks to the first message
    #[arg(short, long = "attach", value_name = "FILE")]
    pub attach: Vec<PathBuf>,
}

/// Arguments for the ask subcommand
#[derive(clap::Args, Debug)]
pub struct AskArgs {
    /// The question to ask
    pub prompt: String,

    #[command(flatten)]
    pub provider: ProviderArgs,

    /// Files to attach as code blocks
    #[arg(short, long, value_name = "FILE")]
    pub file: Vec<PathBuf>,
}

/// Arguments for the compose subcommand
#[derive(clap::Args, Debug)]
pub struct ComposeArgs {
    /// File to rewrite
    pub file: PathBuf,

    /// What to change
    pub request: String,

    #[command(flatten)]
    pub provider: ProviderArgs,

    /// Additional files attached as code blocks
    #[arg(short, long = "attach", value_name = "FILE")]
    pub attach: Vec<PathBuf>,

    /// Write the result back when it applies without errors
    #[arg(long)]
    pub apply: bool,

    /// Number of provider attempts before giving up
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,
}

/// Arguments for the bugs subcommand
#[derive(clap::Args, Debug)]
pub struct BugsArgs {
    /// File to analyze
    pub file: PathBuf,

    #[command(flatten)]
    pub provider: ProviderArgs,

    /// Program input used when reproducing the bug
    #[arg(long, default_value = "")]
    pub input: String,

    /// Data fed to the program on stdin
    #[arg(long, default_value = "")]
    pub stdin: String,

    /// Write the fixed code back to the file
    #[arg(long)]
    pub apply: bool,
}

/// Arguments for the complete subcommand
#[derive(clap::Args, Debug)]
pub struct CompleteArgs {
    /// File containing the comment
    pub file: PathBuf,

    /// Cursor line (1-based)
    #[arg(short, long)]
    pub line: usize,

    /// Cursor column (1-based, defaults to the end of the line)
    #[arg(short, long)]
    pub column: Option<usize>,

    #[command(flatten)]
    pub provider: ProviderArgs,

    /// Accept the suggestion instead of only showing it
    #[arg(long)]
    pub accept: bool,

    /// Write the accepted suggestion back to the file
    #[arg(long, requires = "accept")]
    pub write: bool,
}

/// Arguments for the key subcommand
#[derive(clap::Args, Debug)]
pub struct KeyArgs {
    #[command(subcommand)]
    pub command: KeyCommands,
}

/// Key subcommands
#[derive(Subcommand, Debug)]
pub enum KeyCommands {
    /// Validate a key against the provider and remember it
    Set {
        /// Provider name (openai, anthropic)
        provider: String,
        /// API key
        key: String,
        /// Model to select
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Forget the remembered key for a provider
    Forget {
        /// Provider name (openai, anthropic)
        provider: String,
    },
    /// List providers and where their keys come from
    List,
}

/// Arguments for the state subcommand
#[derive(clap::Args, Debug)]
pub struct StateArgs {
    #[command(subcommand)]
    pub command: StateCommands,
}

/// State subcommands
#[derive(Subcommand, Debug)]
pub enum StateCommands {
    /// Print the remembered state with keys masked
    Show,
    /// Remove the state file
    Clear,
}

/// Arguments for the models subcommand
#[derive(clap::Args, Debug)]
pub struct ModelsArgs {
    /// Provider to list (defaults to the current one)
    #[arg(short, long)]
    pub provider: Option<String>,
}
