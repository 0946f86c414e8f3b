//! Errors from the non-streamed backend endpoints.

use thiserror::Error;

use super::ErrorCategory;
use crate::traits::HttpError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("Backend request failed: {0}")]
    Http(#[from] HttpError),

    /// The endpoint answered 2xx but the body was not what we expect.
    #[error("Unexpected response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

impl BackendError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BackendError::Http(HttpError::ServerError { .. }) => ErrorCategory::Server,
            BackendError::Http(HttpError::InvalidUrl(_)) => ErrorCategory::Client,
            BackendError::Http(_) => ErrorCategory::Network,
            BackendError::Decode { .. } => ErrorCategory::Client,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Http(err) => err.is_retryable(),
            BackendError::Decode { .. } => false,
        }
    }
}
