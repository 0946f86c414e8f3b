//! End-to-end send flows through `SessionManager` against a mocked backend.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;

use common::{drain_events, session_manager, thread_created, CREATE_URL, SEND_URL};
use convo::adapters::mock::{MockHttpClient, MockResponse};
use convo::config::SessionConfig;
use convo::error::{SendError, SendErrorKind, StreamError};
use convo::events::SessionEvent;
use convo::models::{FeatureFlags, Message, MessageRole};
use convo::registry::ThreadRegistry;
use convo::traits::{ByteStream, Headers, HttpClient, HttpError, Response};
use convo::{SessionManager, SessionPhase};

fn history() -> Vec<Message> {
    vec![
        Message::committed(MessageRole::User, "Earlier question"),
        Message::committed(MessageRole::Assistant, "Earlier answer"),
    ]
}

#[tokio::test]
async fn test_new_thread_send_commits_and_navigates_once() {
    let mock = MockHttpClient::new();
    mock.set_response(CREATE_URL, thread_created("t1"));
    mock.set_response(SEND_URL, MockResponse::chunks(&["Hi", " there"]));
    let sessions = session_manager(&mock, SessionConfig::default());
    let mut events = sessions.subscribe();

    let receipt = sessions
        .send(None, "Hello", FeatureFlags::default())
        .await
        .unwrap();
    assert_eq!(receipt.thread_id, "t1");
    assert_eq!(receipt.reply, "Hi there");
    assert!(receipt.created_thread);

    let log = sessions.log("t1").snapshot();
    assert_eq!(
        log.as_slice(),
        &[
            Message::committed(MessageRole::User, "Hello"),
            Message::committed(MessageRole::Assistant, "Hi there"),
        ]
    );

    let events = drain_events(&mut events);
    let navigations: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::NavigateToThread { .. }))
        .collect();
    assert_eq!(
        navigations,
        vec![&SessionEvent::NavigateToThread {
            thread_id: "t1".into()
        }]
    );
    assert!(matches!(&events[0], SessionEvent::ThreadCreated { thread } if thread.id == "t1"));

    let send_body = mock
        .get_requests()
        .into_iter()
        .find(|r| r.url == SEND_URL)
        .and_then(|r| r.json_body())
        .unwrap();
    assert_eq!(send_body["thread_id"], "t1");
    assert_eq!(send_body["message"], "Hello");
}

#[tokio::test]
async fn test_stream_error_without_chunks_restores_log() {
    let mock = MockHttpClient::new();
    mock.set_response(
        SEND_URL,
        MockResponse::chunks_then_error(&[], HttpError::Io("connection reset".into())),
    );
    let sessions = session_manager(&mock, SessionConfig::default());
    sessions.log("t1").seed(history());
    let before = sessions.log("t1").snapshot();

    let failure = sessions
        .send(Some("t1"), "Ping", FeatureFlags::default())
        .await
        .unwrap_err();

    assert_eq!(
        failure.error,
        SendError::StreamTransport(StreamError::Transport(HttpError::Io(
            "connection reset".into()
        )))
    );
    assert_eq!(failure.input, "Ping");
    assert_eq!(sessions.log("t1").snapshot(), before);
    assert!(sessions
        .log("t1")
        .snapshot()
        .iter()
        .all(|m| m.content != "Ping"));
    assert_eq!(sessions.phase("t1"), SessionPhase::Idle);
}

#[tokio::test]
async fn test_mid_stream_failure_is_atomic() {
    let failures = vec![
        MockResponse::chunks_then_error(&["par", "tial"], HttpError::Io("reset".into())),
        MockResponse::StreamError(HttpError::ConnectionFailed("refused".into())),
        MockResponse::StreamError(HttpError::EmptyBody),
        MockResponse::Success(Response::new(500, "internal")),
    ];

    for response in failures {
        let mock = MockHttpClient::new();
        mock.set_response(SEND_URL, response.clone());
        let sessions = session_manager(&mock, SessionConfig::default());
        sessions.log("t1").seed(history());
        let before = sessions.log("t1").snapshot();
        let mut events = sessions.subscribe();

        let failure = sessions
            .send(Some("t1"), "Ping", FeatureFlags::default())
            .await
            .unwrap_err();

        assert_eq!(failure.kind(), SendErrorKind::StreamTransport, "{:?}", response);
        assert_eq!(sessions.log("t1").snapshot(), before, "{:?}", response);
        assert_eq!(
            drain_events(&mut events),
            vec![SessionEvent::SendFailed {
                thread_id: Some("t1".into()),
                kind: SendErrorKind::StreamTransport,
                input: "Ping".into(),
            }]
        );
    }
}

#[tokio::test]
async fn test_read_timeout_rolls_back() {
    let mock = MockHttpClient::new();
    mock.set_response(SEND_URL, MockResponse::chunks_then_hang(&["slow"]));
    let sessions = session_manager(
        &mock,
        SessionConfig::default().with_read_timeout(Some(Duration::from_millis(40))),
    );

    let failure = sessions
        .send(Some("t1"), "Ping", FeatureFlags::default())
        .await
        .unwrap_err();
    assert!(matches!(
        failure.error,
        SendError::StreamTransport(StreamError::ReadTimeout { .. })
    ));
    assert!(sessions.log("t1").is_empty());
}

#[tokio::test]
async fn test_stalled_response_headers_time_out() {
    let mock = MockHttpClient::new();
    mock.set_response(SEND_URL, MockResponse::chunks(&["late"]));
    mock.set_latency(SEND_URL, Duration::from_millis(800));
    let sessions = session_manager(
        &mock,
        SessionConfig::default().with_read_timeout(Some(Duration::from_millis(30))),
    );

    let started = tokio::time::Instant::now();
    let failure = sessions
        .send(Some("t1"), "Ping", FeatureFlags::default())
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(
        failure.error,
        SendError::StreamTransport(StreamError::ReadTimeout { secs: 1 })
    );
    assert!(sessions.log("t1").is_empty());
    assert_eq!(sessions.phase("t1"), SessionPhase::Idle);
}

/// HTTP client whose send stream pauses between chunks.
struct PacedStream {
    chunks: Vec<&'static str>,
    pause: Duration,
}

#[async_trait]
impl HttpClient for PacedStream {
    async fn get(&self, _url: &str, _headers: &Headers) -> Result<Response, HttpError> {
        Err(HttpError::Other("unused".into()))
    }

    async fn post(&self, _url: &str, _body: &str, _headers: &Headers) -> Result<Response, HttpError> {
        Err(HttpError::Other("unused".into()))
    }

    async fn post_stream(
        &self,
        _url: &str,
        _body: &str,
        _headers: &Headers,
    ) -> Result<ByteStream, HttpError> {
        let pause = self.pause;
        let stream = futures::stream::iter(self.chunks.clone()).then(move |chunk| async move {
            tokio::time::sleep(pause).await;
            Ok::<_, HttpError>(Bytes::from_static(chunk.as_bytes()))
        });
        Ok(Box::pin(stream))
    }
}

#[tokio::test]
async fn test_streamed_content_is_prefix_consistent() {
    let chunks = vec!["The ", "quick ", "brown ", "fox"];
    let sessions = Arc::new(SessionManager::new(
        SessionConfig::default(),
        Arc::new(PacedStream {
            chunks: chunks.clone(),
            pause: Duration::from_millis(10),
        }),
    ));

    let mut log_rx = sessions.log("t1").subscribe();
    let task = {
        let sessions = Arc::clone(&sessions);
        tokio::spawn(async move {
            sessions
                .send(Some("t1"), "Go", FeatureFlags::default())
                .await
        })
    };

    let mut observed: Vec<String> = Vec::new();
    while log_rx.changed().await.is_ok() {
        let snapshot = log_rx.borrow_and_update().clone();
        if let Some(reply) = snapshot.get(1) {
            if observed.last() != Some(&reply.content) {
                observed.push(reply.content.clone());
            }
            if reply.committed {
                break;
            }
        }
    }
    let receipt = task.await.unwrap().unwrap();

    let expected: String = chunks.concat();
    assert_eq!(receipt.reply, expected);
    assert_eq!(observed.last(), Some(&expected));
    assert!(observed.len() >= 3, "saw {:?}", observed);
    for pair in observed.windows(2) {
        assert!(
            pair[1].starts_with(&pair[0]),
            "{:?} does not extend {:?}",
            pair[1],
            pair[0]
        );
    }
}

#[tokio::test]
async fn test_back_to_back_sends_share_one_creation() {
    let mock = MockHttpClient::new();
    mock.set_response(CREATE_URL, thread_created("t1"));
    mock.set_latency(CREATE_URL, Duration::from_millis(30));
    mock.set_response(SEND_URL, MockResponse::chunks(&["ok"]));
    mock.set_latency(SEND_URL, Duration::from_millis(30));
    let sessions = session_manager(&mock, SessionConfig::default());

    let (a, b) = tokio::join!(
        sessions.send(None, "first", FeatureFlags::default()),
        sessions.send(None, "second", FeatureFlags::default()),
    );

    assert_eq!(mock.request_count("POST", CREATE_URL), 1);

    let mut resolved = Vec::new();
    let mut busy = 0;
    for result in [a, b] {
        match result {
            Ok(receipt) => resolved.push(receipt.thread_id),
            Err(failure) => match failure.error {
                SendError::SessionBusy { thread_id } => {
                    busy += 1;
                    resolved.push(thread_id);
                }
                other => panic!("unexpected failure {:?}", other),
            },
        }
    }
    assert_eq!(resolved, vec!["t1", "t1"]);
    // The second send resolved while the first was streaming on t1.
    assert_eq!(busy, 1);
    assert_eq!(sessions.log("t1").len(), 2);
}

#[tokio::test]
async fn test_send_while_streaming_is_rejected_without_mutation() {
    let mock = MockHttpClient::new();
    mock.set_response(SEND_URL, MockResponse::chunks_then_hang(&["Working"]));
    let sessions = session_manager(&mock, SessionConfig::default());

    let first = {
        let sessions = Arc::clone(&sessions);
        tokio::spawn(async move {
            sessions
                .send(Some("t1"), "first", FeatureFlags::default())
                .await
        })
    };

    let mut log_rx = sessions.log("t1").subscribe();
    while !log_rx
        .borrow_and_update()
        .iter()
        .any(|m| m.content == "Working")
    {
        log_rx.changed().await.unwrap();
    }
    assert_eq!(sessions.phase("t1"), SessionPhase::Streaming);
    let before = sessions.log("t1").snapshot();

    let failure = sessions
        .send(Some("t1"), "second", FeatureFlags::default())
        .await
        .unwrap_err();
    assert_eq!(
        failure.error,
        SendError::SessionBusy {
            thread_id: "t1".into()
        }
    );
    assert_eq!(failure.input, "second");
    assert_eq!(sessions.log("t1").snapshot(), before);
    assert_eq!(mock.request_count("POST", SEND_URL), 1);

    // Other threads are not blocked.
    mock.set_response(SEND_URL, MockResponse::chunks(&["free"]));
    let other = sessions
        .send(Some("t2"), "elsewhere", FeatureFlags::default())
        .await
        .unwrap();
    assert_eq!(other.reply, "free");

    assert!(sessions.cancel("t1"));
    let cancelled = first.await.unwrap().unwrap_err();
    assert_eq!(cancelled.error, SendError::Cancelled);
    assert_eq!(sessions.phase("t1"), SessionPhase::Idle);
}

#[tokio::test]
async fn test_navigation_follows_commit() {
    let mock = MockHttpClient::new();
    mock.set_response(CREATE_URL, thread_created("t5"));
    mock.set_response(SEND_URL, MockResponse::chunks(&["a", "b"]));
    let sessions = session_manager(&mock, SessionConfig::default());
    let mut events = sessions.subscribe();

    let watcher = {
        let sessions = Arc::clone(&sessions);
        tokio::spawn(async move {
            let mut seen = Vec::new();
            loop {
                match events.recv().await {
                    Ok(SessionEvent::NavigateToThread { thread_id }) => {
                        let log = sessions.log(&thread_id).snapshot();
                        let all_committed = log.len() == 2 && log.iter().all(|m| m.committed);
                        seen.push(("navigate", all_committed));
                        return seen;
                    }
                    Ok(SessionEvent::ThreadTouched { .. }) => seen.push(("touched", true)),
                    Ok(SessionEvent::ThreadCreated { .. }) => seen.push(("created", true)),
                    Ok(other) => panic!("unexpected event {:?}", other),
                    Err(e) => panic!("channel error {:?}", e),
                }
            }
        })
    };

    sessions
        .send(None, "Hello", FeatureFlags::default())
        .await
        .unwrap();

    let seen = watcher.await.unwrap();
    assert_eq!(
        seen,
        vec![("created", true), ("touched", true), ("navigate", true)]
    );
}

#[tokio::test]
async fn test_waiting_send_navigates_when_creator_is_cancelled() {
    let mock = MockHttpClient::new();
    mock.set_response(CREATE_URL, thread_created("t1"));
    mock.set_latency(CREATE_URL, Duration::from_millis(30));
    mock.set_response(SEND_URL, MockResponse::chunks(&["ok"]));
    let sessions = session_manager(&mock, SessionConfig::default());
    let mut events = sessions.subscribe();

    let cancel = tokio_util::sync::CancellationToken::new();
    let (first, second) = tokio::join!(
        sessions.send_with_cancel(None, "first", FeatureFlags::default(), cancel.clone()),
        async {
            cancel.cancel();
            sessions.send(None, "second", FeatureFlags::default()).await
        }
    );

    assert_eq!(first.unwrap_err().error, SendError::Cancelled);
    let receipt = second.unwrap();
    assert_eq!(receipt.thread_id, "t1");
    assert!(receipt.created_thread);
    assert_eq!(mock.request_count("POST", CREATE_URL), 1);

    let events = drain_events(&mut events);
    let navigations: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::NavigateToThread { .. }))
        .collect();
    assert_eq!(
        navigations,
        vec![&SessionEvent::NavigateToThread {
            thread_id: "t1".into()
        }]
    );
    let touched = events
        .iter()
        .position(|e| matches!(e, SessionEvent::ThreadTouched { .. }))
        .unwrap();
    let navigated = events
        .iter()
        .position(|e| matches!(e, SessionEvent::NavigateToThread { .. }))
        .unwrap();
    assert!(touched < navigated);

    // Navigation is owed once per created thread.
    let again = sessions
        .send(None, "third", FeatureFlags::default())
        .await
        .unwrap();
    assert!(!again.created_thread);
}

#[tokio::test]
async fn test_creation_failure_then_retry() {
    let mock = MockHttpClient::new();
    mock.push_response(
        CREATE_URL,
        MockResponse::Success(Response::new(503, "unavailable")),
    );
    mock.set_response(CREATE_URL, thread_created("t8"));
    mock.set_response(SEND_URL, MockResponse::chunks(&["Back"]));
    let sessions = session_manager(&mock, SessionConfig::default());

    let failure = sessions
        .send(None, "Hello", FeatureFlags::default())
        .await
        .unwrap_err();
    assert_eq!(failure.kind(), SendErrorKind::ThreadCreationFailed);
    assert!(failure.error.is_retryable());
    assert_eq!(mock.request_count("POST", SEND_URL), 0);

    let receipt = sessions
        .send(None, &failure.input, FeatureFlags::default())
        .await
        .unwrap();
    assert_eq!(receipt.thread_id, "t8");
    assert!(receipt.created_thread);
    assert_eq!(sessions.log("t8").snapshot()[0].content, "Hello");
}

#[tokio::test]
async fn test_registry_follows_notifications() {
    let mock = MockHttpClient::new();
    mock.set_response(CREATE_URL, thread_created("fresh"));
    mock.set_response(SEND_URL, MockResponse::chunks(&["ok"]));
    let sessions = session_manager(&mock, SessionConfig::default());
    let mut events = sessions.subscribe();

    let mut registry = ThreadRegistry::new();
    registry.prepend(convo::models::ThreadSummary::new("old", "Old chat"));

    sessions
        .send(None, "Hello", FeatureFlags::default().with_search(true))
        .await
        .unwrap();
    for event in drain_events(&mut events) {
        registry.apply(&event);
    }

    let ids: Vec<_> = registry.threads().iter().map(|t| t.id.clone()).collect();
    assert_eq!(ids, vec!["fresh", "old"]);

    sessions
        .send(Some("old"), "Again", FeatureFlags::default())
        .await
        .unwrap();
    for event in drain_events(&mut events) {
        registry.apply(&event);
    }
    let ids: Vec<_> = registry.threads().iter().map(|t| t.id.clone()).collect();
    assert_eq!(ids, vec!["old", "fresh"]);
}
