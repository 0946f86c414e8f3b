//! Per-send failure taxonomy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{BackendError, ErrorCategory, LogError, StreamError};

/// Why a send did not produce a committed exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// Blank input; nothing was attempted.
    #[error("Message is empty")]
    EmptyInput,

    /// Another session is active on this thread. Nothing was changed.
    #[error("A reply is still streaming on thread {thread_id}")]
    SessionBusy { thread_id: String },

    /// No thread id could be provisioned; nothing was appended.
    #[error("Failed to create thread: {0}")]
    ThreadCreationFailed(BackendError),

    /// The reply stream failed; the log was rolled back.
    #[error("{0}")]
    StreamTransport(StreamError),

    /// The caller cancelled and the policy discards partial replies.
    #[error("Send cancelled")]
    Cancelled,

    /// The log rejected an update that this session owned.
    #[error("Message log rejected update: {0}")]
    Log(#[from] LogError),
}

/// Payload-free discriminant of [`SendError`], carried in notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendErrorKind {
    EmptyInput,
    SessionBusy,
    ThreadCreationFailed,
    StreamTransport,
    Cancelled,
    Log,
}

impl SendError {
    pub fn kind(&self) -> SendErrorKind {
        match self {
            SendError::EmptyInput => SendErrorKind::EmptyInput,
            SendError::SessionBusy { .. } => SendErrorKind::SessionBusy,
            SendError::ThreadCreationFailed(_) => SendErrorKind::ThreadCreationFailed,
            SendError::StreamTransport(_) => SendErrorKind::StreamTransport,
            SendError::Cancelled => SendErrorKind::Cancelled,
            SendError::Log(_) => SendErrorKind::Log,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            SendError::EmptyInput | SendError::SessionBusy { .. } | SendError::Cancelled => {
                ErrorCategory::User
            }
            SendError::ThreadCreationFailed(err) => err.category(),
            SendError::StreamTransport(err) => err.category(),
            SendError::Log(_) => ErrorCategory::Client,
        }
    }

    /// Whether sending the same input again can succeed without other action.
    pub fn is_retryable(&self) -> bool {
        match self {
            SendError::ThreadCreationFailed(err) => err.is_retryable(),
            SendError::StreamTransport(err) => err.is_retryable(),
            SendError::Cancelled => true,
            SendError::EmptyInput | SendError::SessionBusy { .. } | SendError::Log(_) => false,
        }
    }

    /// Whether the failure happened before any state changed.
    pub fn is_advisory(&self) -> bool {
        matches!(self, SendError::EmptyInput | SendError::SessionBusy { .. })
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            SendError::EmptyInput => "E_SEND_EMPTY",
            SendError::SessionBusy { .. } => "E_SEND_BUSY",
            SendError::ThreadCreationFailed(_) => "E_THREAD_CREATE",
            SendError::StreamTransport(err) => err.error_code(),
            SendError::Cancelled => "E_SEND_CANCELLED",
            SendError::Log(_) => "E_SEND_LOG",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            SendError::EmptyInput => "Type a message first.".to_string(),
            SendError::SessionBusy { .. } => {
                "Please wait for the current response to complete before sending another message."
                    .to_string()
            }
            SendError::ThreadCreationFailed(_) => "Failed to create chat.".to_string(),
            SendError::StreamTransport(err) => {
                format!("Failed to get response. {}", err.user_message())
            }
            SendError::Cancelled => "Response cancelled.".to_string(),
            SendError::Log(_) => "Something went wrong updating the conversation.".to_string(),
        }
    }
}

/// A failed send, handing back what the user typed so it can be restored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("send failed")]
pub struct SendFailure {
    #[source]
    pub error: SendError,
    /// The original input, unchanged
    pub input: String,
}

impl SendFailure {
    pub fn new(error: SendError, input: impl Into<String>) -> Self {
        Self {
            error,
            input: input.into(),
        }
    }

    pub fn kind(&self) -> SendErrorKind {
        self.error.kind()
    }
}
