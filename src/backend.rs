//! Client for the conversation backend.
//!
//! Wraps an [`HttpClient`] with the four endpoints the session core uses:
//! thread creation, thread listing, thread history and the streamed send.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::BackendError;
use crate::models::{
    CreateThreadRequest, CreatedThread, HistoryMessage, SendRequest, ThreadMessagesResponse,
    ThreadSummary,
};
use crate::traits::{ByteStream, Headers, HttpClient, HttpError, Response};

/// Default backend address.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Client for interacting with the conversation backend API.
#[derive(Clone)]
pub struct BackendClient {
    /// Base URL for the backend API, without trailing slash
    pub base_url: String,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, http: Arc<dyn HttpClient>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, http }
    }

    /// Create a thread. `None` lets the backend choose the default name.
    pub async fn create_thread(&self, name: Option<&str>) -> Result<ThreadSummary, BackendError> {
        let path = "/thread/create";
        let body = serde_json::to_string(&CreateThreadRequest {
            name: name.map(str::to_string),
        })
        .map_err(|e| decode_error(path, e))?;

        let response = self
            .http
            .post(&self.url(path), &body, &json_headers())
            .await?;
        let created: CreatedThread = parse(path, &response)?;
        debug!(thread_id = %created.thread_id, "Thread created");
        Ok(created.into())
    }

    /// All threads the backend knows about, in backend order.
    pub async fn list_threads(&self) -> Result<Vec<ThreadSummary>, BackendError> {
        let path = "/thread/list";
        let response = self.http.get(&self.url(path), &json_headers()).await?;
        parse(path, &response)
    }

    /// Persisted history of a thread, oldest first.
    pub async fn fetch_messages(
        &self,
        thread_id: &str,
    ) -> Result<Vec<HistoryMessage>, BackendError> {
        let path = format!("/thread/{}/messages", urlencoding::encode(thread_id));
        let response = self.http.get(&self.url(&path), &json_headers()).await?;
        let body: ThreadMessagesResponse = parse(&path, &response)?;
        Ok(body.messages)
    }

    /// Open the reply stream for one send.
    ///
    /// Fails before yielding anything on connection failure, non-2xx status
    /// or a missing body.
    pub async fn open_send_stream(&self, request: &SendRequest) -> Result<ByteStream, HttpError> {
        let body = serde_json::to_string(request).map_err(|e| HttpError::Other(e.to_string()))?;
        debug!(thread_id = %request.thread_id, "Opening send stream");
        self.http
            .post_stream(&self.url("/chat/send"), &body, &json_headers())
            .await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn json_headers() -> Headers {
    let mut headers = Headers::new();
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    headers
}

fn parse<T: DeserializeOwned>(endpoint: &str, response: &Response) -> Result<T, BackendError> {
    if !response.is_success() {
        return Err(HttpError::ServerError {
            status: response.status,
            message: response.text(),
        }
        .into());
    }
    response.json().map_err(|e| decode_error(endpoint, e))
}

fn decode_error(endpoint: &str, err: serde_json::Error) -> BackendError {
    BackendError::Decode {
        endpoint: endpoint.to_string(),
        message: err.to_string(),
    }
}
