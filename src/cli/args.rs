//! Command-line argument parsing for the convo CLI.
//!
//! This module handles parsing command-line arguments and determining
//! which CLI command to execute.

use crate::models::FeatureFlags;

/// Parsed CLI command to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    /// Send a message and stream the reply
    Send {
        /// Existing thread; a new one is created when absent
        thread: Option<String>,
        features: FeatureFlags,
        message: String,
    },
    /// List threads, most recent first
    Threads,
    /// Print a thread's history
    History { thread_id: String },
    /// Show version information
    Version,
    /// Show usage
    Help,
    /// Arguments could not be understood
    Invalid(String),
}

pub const USAGE: &str = "\
Usage:
  convo send [--thread ID] [--search] [--think] [--agentic] MESSAGE...
  convo threads
  convo history ID
  convo --version

Environment:
  CONVO_BACKEND_URL        backend base URL (default http://localhost:8000)
  CONVO_READ_TIMEOUT_SECS  give up when no data arrives for this long
  CONVO_KEEP_PARTIAL=1     keep a partial reply when cancelled with Ctrl-C
  RUST_LOG                 log filter for stderr (default warn)";

/// Parse command-line arguments and return the appropriate command.
///
/// # Examples
///
/// ```
/// use convo::cli::args::{parse_args, CliCommand};
///
/// let args = vec!["convo".to_string(), "--version".to_string()];
/// assert_eq!(parse_args(args.into_iter()), CliCommand::Version);
/// ```
pub fn parse_args<I>(args: I) -> CliCommand
where
    I: Iterator<Item = String>,
{
    // Skip the program name
    let mut args = args.skip(1);
    let Some(first) = args.next() else {
        return CliCommand::Help;
    };

    match first.as_str() {
        "--version" | "-V" => CliCommand::Version,
        "--help" | "-h" | "help" => CliCommand::Help,
        "send" => parse_send(args),
        "threads" => CliCommand::Threads,
        "history" => match args.next() {
            Some(thread_id) if !thread_id.starts_with('-') => CliCommand::History { thread_id },
            _ => CliCommand::Invalid("history needs a thread id".to_string()),
        },
        other => CliCommand::Invalid(format!("unknown command '{}'", other)),
    }
}

fn parse_send(mut args: impl Iterator<Item = String>) -> CliCommand {
    let mut thread = None;
    let mut features = FeatureFlags::default();
    let mut words = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--thread" | "-t" => match args.next() {
                Some(id) => thread = Some(id),
                None => return CliCommand::Invalid("--thread needs a value".to_string()),
            },
            "--search" => features.search = true,
            "--think" | "--deep-think" => features.deep_think = true,
            "--agentic" => features.agentic = true,
            // Everything after `--` is message text
            "--" => {
                words.extend(args.by_ref());
                break;
            }
            flag if flag.starts_with("--") => {
                return CliCommand::Invalid(format!("unknown option '{}'", flag));
            }
            _ => words.push(arg),
        }
    }

    let message = words.join(" ");
    if message.trim().is_empty() {
        return CliCommand::Invalid("send needs a message".to_string());
    }

    CliCommand::Send {
        thread,
        features,
        message,
    }
}
