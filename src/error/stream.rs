//! Errors raised while consuming a reply stream.

use thiserror::Error;

use super::ErrorCategory;
use crate::traits::HttpError;

/// Failure of the streamed exchange with the send endpoint.
///
/// Any of these means "no usable completion": the caller rolls back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// Connection failed, non-2xx status, missing body, or a read failed
    /// mid-stream.
    #[error("Stream transport error: {0}")]
    Transport(#[from] HttpError),

    /// No chunk arrived within the configured read bound.
    #[error("Stream timeout: no data for {secs} seconds")]
    ReadTimeout { secs: u64 },
}

impl StreamError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            StreamError::Transport(HttpError::ServerError { .. }) => ErrorCategory::Server,
            StreamError::Transport(HttpError::EmptyBody) => ErrorCategory::Server,
            StreamError::Transport(HttpError::InvalidUrl(_)) => ErrorCategory::Client,
            StreamError::Transport(_) | StreamError::ReadTimeout { .. } => ErrorCategory::Network,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            StreamError::Transport(err) => err.is_retryable(),
            StreamError::ReadTimeout { .. } => true,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            StreamError::Transport(HttpError::ServerError { .. }) => "E_STREAM_STATUS",
            StreamError::Transport(HttpError::EmptyBody) => "E_STREAM_NO_BODY",
            StreamError::Transport(_) => "E_STREAM_CONN",
            StreamError::ReadTimeout { .. } => "E_STREAM_TIMEOUT",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            StreamError::Transport(HttpError::ServerError { status, .. }) => {
                format!("The server could not answer (status {}).", status)
            }
            StreamError::Transport(HttpError::EmptyBody) => {
                "The server sent an empty reply.".to_string()
            }
            StreamError::Transport(_) => "The connection to the server was lost.".to_string(),
            StreamError::ReadTimeout { secs } => {
                format!("No response from server for {} seconds.", secs)
            }
        }
    }
}
