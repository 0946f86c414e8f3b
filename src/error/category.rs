//! Error category classification.
//!
//! Categories drive retry decisions and what the user is told, independent of
//! which layer produced the error.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connection, DNS, timeout. Generally transient.
    Network,

    /// Backend rejected or failed the request (non-2xx).
    Server,

    /// Malformed data or misuse of an API inside this client.
    Client,

    /// Needs the user to act or wait (busy thread, cancelled, blank input).
    User,
}

impl ErrorCategory {
    /// Whether errors in this category are generally transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::Network | ErrorCategory::Server)
    }

    /// Short label suitable for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Server => "server",
            ErrorCategory::Client => "client",
            ErrorCategory::User => "user",
        }
    }

    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "Check that the backend is reachable, then send again.",
            ErrorCategory::Server => "The backend had a problem. Wait a moment and send again.",
            ErrorCategory::Client => "This looks like a client bug. Please report it.",
            ErrorCategory::User => "Wait for the current reply to finish, then send again.",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
