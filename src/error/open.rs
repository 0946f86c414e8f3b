use thiserror::Error;

use super::BackendError;

/// Failure to load a thread's history into its log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpenThreadError {
    /// A send is in progress on the thread; its log was left alone.
    #[error("A reply is still streaming on thread {thread_id}")]
    SessionBusy { thread_id: String },

    #[error("Failed to load thread history: {0}")]
    Backend(#[from] BackendError),
}
