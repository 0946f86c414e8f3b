use serde::{Deserialize, Serialize};

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// One entry of the optimistic log.
///
/// Position in the log is the only ordering key; there is deliberately no
/// timestamp. `content` may only change while `committed` is false.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    /// False while streaming or awaiting confirmation; true once final
    #[serde(default)]
    pub committed: bool,
}

impl Message {
    /// Uncommitted user message, visible before the backend has it.
    pub fn optimistic_user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            committed: false,
        }
    }

    /// Empty, uncommitted assistant message awaiting streamed content.
    pub fn placeholder() -> Self {
        Self {
            role: MessageRole::Assistant,
            content: String::new(),
            committed: false,
        }
    }

    /// Already-persisted message (history).
    pub fn committed(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            committed: true,
        }
    }

    /// An assistant message that has not received any content yet.
    pub fn is_placeholder(&self) -> bool {
        self.role == MessageRole::Assistant && !self.committed && self.content.is_empty()
    }
}

/// Message as returned by the thread-messages endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryMessage {
    pub role: MessageRole,
    #[serde(default, deserialize_with = "super::deserialize_nullable_string")]
    pub content: String,
}

impl From<HistoryMessage> for Message {
    fn from(msg: HistoryMessage) -> Self {
        Message::committed(msg.role, msg.content)
    }
}

/// Body of `GET /thread/{id}/messages`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ThreadMessagesResponse {
    #[serde(default)]
    pub messages: Vec<HistoryMessage>,
}
