//! Notifications published by the session core.
//!
//! Delivered over a tokio broadcast channel (see
//! [`SessionManager::subscribe`](crate::session::SessionManager::subscribe)).
//! Collaborators such as the [`ThreadRegistry`](crate::registry::ThreadRegistry)
//! react to them instead of being mutated directly.

use serde::Serialize;

use crate::error::SendErrorKind;
use crate::models::ThreadSummary;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The backend provisioned a new thread. Emitted once per creation.
    ThreadCreated { thread: ThreadSummary },

    /// Show this thread. Only emitted for a thread created by the send that
    /// just committed, and only after both of its messages are committed.
    NavigateToThread { thread_id: String },

    /// A send committed on this thread; it is now the most recently active.
    ThreadTouched { thread_id: String },

    /// A send ended without a committed exchange.
    SendFailed {
        /// Thread the send was resolved to, if it got that far
        thread_id: Option<String>,
        kind: SendErrorKind,
        /// What the user typed, for restoring into the input
        input: String,
    },
}

impl SessionEvent {
    /// Thread this notification concerns, if any.
    pub fn thread_id(&self) -> Option<&str> {
        match self {
            SessionEvent::ThreadCreated { thread } => Some(&thread.id),
            SessionEvent::NavigateToThread { thread_id }
            | SessionEvent::ThreadTouched { thread_id } => Some(thread_id),
            SessionEvent::SendFailed { thread_id, .. } => thread_id.as_deref(),
        }
    }
}
