//! Wire and in-memory data types.

mod message;
mod request;
mod thread;

pub use message::{HistoryMessage, Message, MessageRole, ThreadMessagesResponse};
pub use request::{CreateThreadRequest, FeatureFlags, SendRequest};
pub use thread::{CreatedThread, ThreadSummary, DEFAULT_THREAD_NAME};

use serde::{Deserialize, Deserializer};

/// Deserialize an ID that can be either a string or an integer.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Signed(i64),
        Unsigned(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Signed(n) => n.to_string(),
        RawId::Unsigned(n) => n.to_string(),
    })
}

/// Deserialize a string that may be null, mapping null to the empty string.
pub(crate) fn deserialize_nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
