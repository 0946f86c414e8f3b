//! Session configuration.

use std::time::Duration;

use crate::backend::DEFAULT_BASE_URL;

/// What happens to a reply that was cancelled part-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancelPolicy {
    /// Roll the exchange back as if the stream had failed
    #[default]
    Discard,
    /// Commit whatever had streamed in as a shorter reply
    KeepPartial,
}

/// Configuration for a [`SessionManager`](crate::session::SessionManager).
///
/// Use the builder pattern to customize behavior.
///
/// # Example
///
/// ```ignore
/// use convo::config::{CancelPolicy, SessionConfig};
/// use std::time::Duration;
///
/// let config = SessionConfig::default()
///     .with_base_url("http://localhost:9000")
///     .with_read_timeout(Some(Duration::from_secs(60)))
///     .with_cancel_policy(CancelPolicy::KeepPartial);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Backend base URL (default: http://localhost:8000)
    pub base_url: String,
    /// Bound on each chunk read; `None` waits indefinitely
    pub read_timeout: Option<Duration>,
    pub cancel_policy: CancelPolicy,
    /// Name sent when creating a thread; `None` lets the backend pick
    pub default_thread_name: Option<String>,
    /// Buffer size of the notification channel
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            read_timeout: None,
            cancel_policy: CancelPolicy::Discard,
            default_thread_name: None,
            event_capacity: 64,
        }
    }
}

impl SessionConfig {
    pub const ENV_BACKEND_URL: &'static str = "CONVO_BACKEND_URL";
    pub const ENV_READ_TIMEOUT_SECS: &'static str = "CONVO_READ_TIMEOUT_SECS";
    pub const ENV_KEEP_PARTIAL: &'static str = "CONVO_KEEP_PARTIAL";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_cancel_policy(mut self, policy: CancelPolicy) -> Self {
        self.cancel_policy = policy;
        self
    }

    pub fn with_default_thread_name(mut self, name: impl Into<String>) -> Self {
        self.default_thread_name = Some(name.into());
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Create config from `CONVO_*` environment variables.
    ///
    /// Unset or unparseable values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup(Self::ENV_BACKEND_URL).filter(|u| !u.trim().is_empty()) {
            config.base_url = url.trim().to_string();
        }

        match lookup(Self::ENV_READ_TIMEOUT_SECS).map(|v| v.trim().parse::<u64>()) {
            Some(Ok(secs)) if secs > 0 => config.read_timeout = Some(Duration::from_secs(secs)),
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Ignoring invalid {}", Self::ENV_READ_TIMEOUT_SECS)
            }
            None => {}
        }

        if lookup(Self::ENV_KEEP_PARTIAL).is_some_and(|v| matches!(v.trim(), "1" | "true")) {
            config.cancel_policy = CancelPolicy::KeepPartial;
        }

        config
    }
}
