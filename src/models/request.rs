use serde::{Deserialize, Serialize};

/// Optional backend behaviours toggled per send.
///
/// Opaque to the session core: forwarded verbatim in the send body.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlags {
    /// Extended reasoning
    #[serde(default)]
    pub deep_think: bool,
    /// Web search
    #[serde(default)]
    pub search: bool,
    /// Tool-using agent mode
    #[serde(default)]
    pub agentic: bool,
}

impl FeatureFlags {
    pub fn with_deep_think(mut self, on: bool) -> Self {
        self.deep_think = on;
        self
    }

    pub fn with_search(mut self, on: bool) -> Self {
        self.search = on;
        self
    }

    pub fn with_agentic(mut self, on: bool) -> Self {
        self.agentic = on;
        self
    }

    pub fn any(&self) -> bool {
        self.deep_think || self.search || self.agentic
    }
}

/// Body of `POST /chat/send`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendRequest {
    /// Resolved thread the message belongs to
    pub thread_id: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<FeatureFlags>,
}

impl SendRequest {
    pub fn new(thread_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            message: message.into(),
            features: None,
        }
    }

    /// Attach feature flags (builder pattern)
    pub fn with_features(mut self, features: FeatureFlags) -> Self {
        self.features = Some(features);
        self
    }
}

/// Body of `POST /thread/create`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CreateThreadRequest {
    pub name: Option<String>,
}
