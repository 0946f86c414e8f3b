//! Common test utilities for integration tests.
//!
//! Builds a [`SessionManager`] over a [`MockHttpClient`] and provides canned
//! backend responses.

#![allow(dead_code)]

use std::sync::Arc;

use convo::adapters::mock::{MockHttpClient, MockResponse};
use convo::config::SessionConfig;
use convo::events::SessionEvent;
use convo::traits::Response;
use convo::SessionManager;
use tokio::sync::broadcast;

pub const BASE_URL: &str = "http://backend.test";
pub const CREATE_URL: &str = "http://backend.test/thread/create";
pub const SEND_URL: &str = "http://backend.test/chat/send";

/// Session manager wired to `mock`, with the test base URL.
pub fn session_manager(mock: &MockHttpClient, config: SessionConfig) -> Arc<SessionManager> {
    Arc::new(SessionManager::new(
        config.with_base_url(BASE_URL),
        Arc::new(mock.clone()),
    ))
}

/// Successful `POST /thread/create` response.
pub fn thread_created(id: &str) -> MockResponse {
    MockResponse::Success(Response::json_ok(
        &serde_json::json!({"thread_id": id, "name": "New Chat"}),
    ))
}

/// Everything currently queued on the notification channel.
pub fn drain_events(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
