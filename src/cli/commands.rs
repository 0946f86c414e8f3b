//! Command handlers for the convo CLI.

use std::io::Write;
use std::sync::Arc;

use color_eyre::{Report, Result};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::SendFailure;
use crate::events::SessionEvent;
use crate::log::LogSnapshot;
use crate::models::FeatureFlags;
use crate::registry::ThreadRegistry;
use crate::session::{SendReceipt, SessionManager};

type SendTask = JoinHandle<std::result::Result<SendReceipt, SendFailure>>;

/// Send one message and stream the reply to stdout.
///
/// Ctrl-C cancels the send.
pub async fn send(
    sessions: Arc<SessionManager>,
    thread: Option<String>,
    features: FeatureFlags,
    message: String,
) -> Result<()> {
    let mut events = sessions.subscribe();
    // Load the thread's history so the send appends after it; the reply
    // placeholder sits right after the user message the send appends.
    let reply_index = match &thread {
        Some(id) => sessions.open_thread(id).await?.len() + 1,
        None => 1,
    };

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let mut task: SendTask = {
        let sessions = Arc::clone(&sessions);
        let thread = thread.clone();
        tokio::spawn(async move {
            sessions
                .send_with_cancel(thread.as_deref(), message, features, cancel)
                .await
        })
    };

    let thread_id = match thread {
        Some(id) => id,
        None => loop {
            tokio::select! {
                joined = &mut task => return finish(joined?, 0),
                event = events.recv() => match event {
                    Ok(SessionEvent::ThreadCreated { thread }) => break thread.id,
                    Ok(_) | Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return finish(task.await?, 0),
                },
            }
        },
    };
    debug!(thread_id = %thread_id, "Streaming reply");

    let mut log_rx = sessions.log(&thread_id).subscribe();
    let mut printed = 0;
    loop {
        let snapshot = log_rx.borrow_and_update().clone();
        printed = print_reply_delta(&snapshot, reply_index, printed)?;

        tokio::select! {
            joined = &mut task => return finish(joined?, printed),
            changed = log_rx.changed() => {
                if changed.is_err() {
                    return finish(task.await?, printed);
                }
            }
        }
    }
}

/// Print the part of the reply that has not been printed yet.
fn print_reply_delta(snapshot: &LogSnapshot, index: usize, printed: usize) -> Result<usize> {
    let Some(reply) = snapshot.get(index) else {
        return Ok(printed);
    };
    match reply.content.get(printed..) {
        Some(delta) if !delta.is_empty() => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(delta.as_bytes())?;
            stdout.flush()?;
            Ok(reply.content.len())
        }
        _ => Ok(printed),
    }
}

fn finish(result: std::result::Result<SendReceipt, SendFailure>, printed: usize) -> Result<()> {
    match result {
        Ok(receipt) => {
            let rest = receipt.reply.get(printed..).unwrap_or_default();
            print!("{}", rest);
            println!();
            if receipt.cancelled {
                eprintln!("(cancelled, partial reply kept)");
            }
            if receipt.created_thread {
                eprintln!("thread: {}", receipt.thread_id);
            }
            Ok(())
        }
        Err(failure) => {
            if printed > 0 {
                println!();
            }
            let message = failure.error.user_message();
            Err(Report::new(failure).wrap_err(message))
        }
    }
}

/// List threads, most recently updated first.
pub async fn threads(sessions: &SessionManager) -> Result<()> {
    let mut registry = ThreadRegistry::new();
    registry.replace_all(sessions.backend().list_threads().await?);

    for thread in registry.threads() {
        let updated = thread
            .updated_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!("{}\t{}\t{}", thread.id, updated, thread.display_name());
    }
    Ok(())
}

/// Print a thread's history.
pub async fn history(sessions: &SessionManager, thread_id: &str) -> Result<()> {
    let log = sessions.open_thread(thread_id).await?;
    for message in log.snapshot().iter() {
        println!("{}: {}", message.role.as_str(), message.content);
    }
    Ok(())
}
