use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{deserialize_id, deserialize_nullable_string};

/// Display name the backend gives a thread created without one.
pub const DEFAULT_THREAD_NAME: &str = "New Chat";

/// Thread as listed by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThreadSummary {
    /// Opaque identifier (string or integer on the wire)
    #[serde(rename = "thread_id", alias = "id", alias = "_id", deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub name: String,
    /// Last activity; used to order the thread list
    #[serde(default, alias = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ThreadSummary {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            updated_at: None,
        }
    }

    /// Name to show in lists; falls back to the backend default.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            DEFAULT_THREAD_NAME
        } else {
            &self.name
        }
    }
}

/// Body of `POST /thread/create`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreatedThread {
    #[serde(deserialize_with = "deserialize_id")]
    pub thread_id: String,
    #[serde(default, deserialize_with = "deserialize_nullable_string")]
    pub name: String,
}

impl From<CreatedThread> for ThreadSummary {
    fn from(created: CreatedThread) -> Self {
        Self {
            id: created.thread_id,
            name: created.name,
            updated_at: Some(Utc::now()),
        }
    }
}
