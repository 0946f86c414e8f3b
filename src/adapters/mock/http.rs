//! Mock HTTP client for testing.
//!
//! Returns canned responses per URL, records every request, and can simulate
//! slow endpoints, mid-stream failures and streams that never finish.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::StreamExt;

use crate::traits::{ByteStream, Headers, HttpClient, HttpError, Response};

/// A recorded HTTP request for verification in tests.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    /// HTTP method (GET or POST)
    pub method: String,
    pub url: String,
    pub headers: Headers,
    /// Request body (POST only)
    pub body: Option<String>,
}

impl RecordedRequest {
    /// Parse the recorded body as JSON.
    pub fn json_body(&self) -> Option<serde_json::Value> {
        self.body
            .as_deref()
            .and_then(|b| serde_json::from_str(b).ok())
    }
}

/// Configuration for a mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Buffered response (any status)
    Success(Response),
    /// Fail the request itself
    Error(HttpError),
    /// Stream these chunks, then end normally
    Stream(Vec<Bytes>),
    /// Fail before any chunk is yielded
    StreamError(HttpError),
    /// Stream these chunks, then fail with the error
    StreamThenError(Vec<Bytes>, HttpError),
    /// Stream these chunks, then never yield again
    StreamThenHang(Vec<Bytes>),
}

impl MockResponse {
    /// Convenience for a chunked text stream.
    pub fn chunks(chunks: &[&str]) -> Self {
        MockResponse::Stream(to_bytes(chunks))
    }

    /// Convenience for a text stream that fails after `chunks`.
    pub fn chunks_then_error(chunks: &[&str], err: HttpError) -> Self {
        MockResponse::StreamThenError(to_bytes(chunks), err)
    }

    /// Convenience for a text stream that stalls after `chunks`.
    pub fn chunks_then_hang(chunks: &[&str]) -> Self {
        MockResponse::StreamThenHang(to_bytes(chunks))
    }
}

fn to_bytes(chunks: &[&str]) -> Vec<Bytes> {
    chunks
        .iter()
        .map(|c| Bytes::copy_from_slice(c.as_bytes()))
        .collect()
}

#[derive(Debug, Default)]
struct MockState {
    /// Fixed responses by URL (exact, then longest prefix)
    responses: HashMap<String, MockResponse>,
    /// One-shot responses consumed before the fixed ones
    queued: HashMap<String, VecDeque<MockResponse>>,
    default_response: Option<MockResponse>,
    latency: HashMap<String, Duration>,
    requests: Vec<RecordedRequest>,
}

/// Mock HTTP client for testing.
///
/// Clones share state, so a test can keep one handle for assertions while the
/// code under test owns another.
///
/// ```ignore
/// let http = MockHttpClient::new();
/// http.set_response(
///     "http://backend/chat/send",
///     MockResponse::chunks(&["Hi", " there"]),
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockHttpClient {
    state: Arc<Mutex<MockState>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Set the response for a URL (or URL prefix).
    pub fn set_response(&self, url: &str, response: MockResponse) {
        self.lock().responses.insert(url.to_string(), response);
    }

    /// Queue a one-shot response for a URL; queued responses are used in FIFO
    /// order before the fixed response for the same URL.
    pub fn push_response(&self, url: &str, response: MockResponse) {
        self.lock()
            .queued
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn set_default_response(&self, response: MockResponse) {
        self.lock().default_response = Some(response);
    }

    /// Delay every response for `url` by `delay`.
    pub fn set_latency(&self, url: &str, delay: Duration) {
        self.lock().latency.insert(url.to_string(), delay);
    }

    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Number of recorded requests with this method and exact URL.
    pub fn request_count(&self, method: &str, url: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.method == method && r.url == url)
            .count()
    }

    pub fn clear_requests(&self) {
        self.lock().requests.clear();
    }

    fn record_request(&self, method: &str, url: &str, headers: &Headers, body: Option<String>) {
        self.lock().requests.push(RecordedRequest {
            method: method.to_string(),
            url: url.to_string(),
            headers: headers.clone(),
            body,
        });
    }

    fn lookup<'a, T>(map: &'a HashMap<String, T>, url: &str) -> Option<&'a T> {
        if let Some(value) = map.get(url) {
            return Some(value);
        }
        map.iter()
            .filter(|(pattern, _)| url.starts_with(pattern.as_str()))
            .max_by_key(|(pattern, _)| pattern.len())
            .map(|(_, value)| value)
    }

    fn get_response(&self, url: &str) -> Option<MockResponse> {
        let mut state = self.lock();
        if let Some(queue) = state.queued.get_mut(url) {
            if let Some(response) = queue.pop_front() {
                return Some(response);
            }
        }
        Self::lookup(&state.responses, url)
            .cloned()
            .or_else(|| state.default_response.clone())
    }

    async fn simulate_latency(&self, url: &str) {
        let delay = Self::lookup(&self.lock().latency, url).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn buffered(url: &str, response: Option<MockResponse>) -> Result<Response, HttpError> {
        match response {
            Some(MockResponse::Success(response)) => Ok(response),
            Some(MockResponse::Error(err)) | Some(MockResponse::StreamError(err)) => Err(err),
            Some(_) => Err(HttpError::Other(
                "Stream response on non-stream request".to_string(),
            )),
            None => Err(HttpError::Other(format!("No mock response for URL: {}", url))),
        }
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get(&self, url: &str, headers: &Headers) -> Result<Response, HttpError> {
        self.record_request("GET", url, headers, None);
        self.simulate_latency(url).await;
        Self::buffered(url, self.get_response(url))
    }

    async fn post(&self, url: &str, body: &str, headers: &Headers) -> Result<Response, HttpError> {
        self.record_request("POST", url, headers, Some(body.to_string()));
        self.simulate_latency(url).await;
        Self::buffered(url, self.get_response(url))
    }

    async fn post_stream(
        &self,
        url: &str,
        body: &str,
        headers: &Headers,
    ) -> Result<ByteStream, HttpError> {
        self.record_request("POST", url, headers, Some(body.to_string()));
        self.simulate_latency(url).await;

        match self.get_response(url) {
            Some(MockResponse::Stream(chunks)) => {
                Ok(Box::pin(futures::stream::iter(chunks.into_iter().map(Ok))))
            }
            Some(MockResponse::StreamThenError(chunks, err)) => {
                let items = chunks
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(err)));
                Ok(Box::pin(futures::stream::iter(items)))
            }
            Some(MockResponse::StreamThenHang(chunks)) => {
                let stream = futures::stream::iter(chunks.into_iter().map(Ok))
                    .chain(futures::stream::pending());
                Ok(Box::pin(stream))
            }
            Some(MockResponse::StreamError(err)) | Some(MockResponse::Error(err)) => Err(err),
            Some(MockResponse::Success(response)) if !response.is_success() => {
                Err(HttpError::ServerError {
                    status: response.status,
                    message: response.text(),
                })
            }
            Some(MockResponse::Success(_)) => Err(HttpError::Other(
                "Non-stream response on stream request".to_string(),
            )),
            None => Err(HttpError::Other(format!("No mock response for URL: {}", url))),
        }
    }
}
