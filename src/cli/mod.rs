//! CLI module for convo.
//!
//! This module provides command-line interface functionality including:
//! - Argument parsing
//! - Version display
//! - The send / threads / history commands
//!
//! # Usage
//!
//! ```ignore
//! use convo::cli::{parse_args, run_cli_command};
//! use convo::config::SessionConfig;
//!
//! let command = parse_args(std::env::args());
//! run_cli_command(command, SessionConfig::from_env()).await?;
//! ```

pub mod args;
pub mod commands;
pub mod version;

pub use args::{parse_args, CliCommand, USAGE};
pub use version::{version_string, VERSION};

use std::sync::Arc;

use color_eyre::eyre::eyre;
use color_eyre::Result;

use crate::adapters::ReqwestHttpClient;
use crate::config::SessionConfig;
use crate::session::SessionManager;

/// Run a parsed command against the backend described by `config`.
pub async fn run_cli_command(command: CliCommand, config: SessionConfig) -> Result<()> {
    match command {
        CliCommand::Version => {
            println!("{}", version_string());
            Ok(())
        }
        CliCommand::Help => {
            println!("{}", USAGE);
            Ok(())
        }
        CliCommand::Invalid(reason) => {
            eprintln!("{}", USAGE);
            Err(eyre!(reason))
        }
        CliCommand::Send {
            thread,
            features,
            message,
        } => commands::send(sessions(config), thread, features, message).await,
        CliCommand::Threads => commands::threads(&sessions(config)).await,
        CliCommand::History { thread_id } => {
            commands::history(&sessions(config), &thread_id).await
        }
    }
}

fn sessions(config: SessionConfig) -> Arc<SessionManager> {
    Arc::new(SessionManager::new(
        config,
        Arc::new(ReqwestHttpClient::new()),
    ))
}
