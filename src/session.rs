//! Send orchestration.
//!
//! [`SessionManager`] runs each send through one state machine:
//!
//! ```text
//! Idle -> ResolvingThread -> Streaming -> Committing  -> Idle
//!                  |              |
//!                  +--------------+----> RollingBack -> Idle
//! ```
//!
//! At most one send is active per thread. The user message and the assistant
//! placeholder are appended only once the thread id is known, and either both
//! end up committed or both are removed again.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::backend::BackendClient;
use crate::config::{CancelPolicy, SessionConfig};
use crate::error::{OpenThreadError, SendError, SendFailure};
use crate::events::SessionEvent;
use crate::log::OptimisticLog;
use crate::models::{FeatureFlags, Message, SendRequest};
use crate::resolver::{ThreadHandle, ThreadResolver, ThreadState};
use crate::stream::{StreamConsumer, StreamOutcome};
use crate::traits::HttpClient;

/// Where a thread's current send is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    Idle,
    ResolvingThread,
    Streaming,
    Committing,
    RollingBack,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::ResolvingThread => "resolving_thread",
            SessionPhase::Streaming => "streaming",
            SessionPhase::Committing => "committing",
            SessionPhase::RollingBack => "rolling_back",
        };
        f.write_str(name)
    }
}

/// A send that ended with a committed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub thread_id: String,
    /// Final assistant content as committed
    pub reply: String,
    /// First exchange committed on a thread created for a "new chat" send;
    /// a `NavigateToThread` notification was emitted for it
    pub created_thread: bool,
    /// The reply was cut short by cancellation and kept
    pub cancelled: bool,
}

#[derive(Debug)]
struct ActiveSession {
    session_id: Uuid,
    phase: SessionPhase,
    cancel: CancellationToken,
}

type ActiveMap = Arc<Mutex<HashMap<String, ActiveSession>>>;

/// Exclusive right to send on one thread. Dropping it returns the thread to
/// [`SessionPhase::Idle`].
struct SessionLease {
    active: ActiveMap,
    thread_id: String,
}

impl SessionLease {
    fn set_phase(&self, phase: SessionPhase) {
        if let Some(session) = lock(&self.active).get_mut(&self.thread_id) {
            debug!(thread_id = %self.thread_id, %phase, "Session phase");
            session.phase = phase;
        }
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        lock(&self.active).remove(&self.thread_id);
    }
}

/// The two speculative messages of one send.
#[derive(Clone, Copy)]
struct Exchange<'a> {
    lease: &'a SessionLease,
    thread_id: &'a str,
    log: &'a OptimisticLog,
    user_index: usize,
    placeholder: usize,
}

/// Owns the logs of every open thread and runs sends against them.
pub struct SessionManager {
    backend: Arc<BackendClient>,
    consumer: StreamConsumer,
    config: SessionConfig,
    events: broadcast::Sender<SessionEvent>,
    /// Resolver for the current "new chat" intent
    resolver: Mutex<Arc<ThreadResolver>>,
    logs: Mutex<HashMap<String, OptimisticLog>>,
    active: ActiveMap,
}

impl SessionManager {
    pub fn new(config: SessionConfig, http: Arc<dyn HttpClient>) -> Self {
        let backend = Arc::new(BackendClient::new(config.base_url.clone(), http));
        let consumer =
            StreamConsumer::new(Arc::clone(&backend)).with_read_timeout(config.read_timeout);
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let resolver = Arc::new(ThreadResolver::new(
            Arc::clone(&backend),
            config.default_thread_name.clone(),
            events.clone(),
        ));

        Self {
            backend,
            consumer,
            config,
            events,
            resolver: Mutex::new(resolver),
            logs: Mutex::new(HashMap::new()),
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn backend(&self) -> &BackendClient {
        &self.backend
    }

    /// Receive notifications emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// The log of a thread, created empty on first use.
    pub fn log(&self, thread_id: &str) -> OptimisticLog {
        lock(&self.logs)
            .entry(thread_id.to_string())
            .or_default()
            .clone()
    }

    /// The log of a thread if one is open, without creating it.
    pub fn find_log(&self, thread_id: &str) -> Option<OptimisticLog> {
        lock(&self.logs).get(thread_id).cloned()
    }

    /// Drop a thread's log. Refused, returning false, while a send is active
    /// on the thread.
    pub fn close_thread(&self, thread_id: &str) -> bool {
        let active = lock(&self.active);
        if active.contains_key(thread_id) {
            return false;
        }
        let closed = lock(&self.logs).remove(thread_id).is_some();
        drop(active);
        debug!(thread_id, closed, "Closed thread log");
        true
    }

    pub fn phase(&self, thread_id: &str) -> SessionPhase {
        lock(&self.active)
            .get(thread_id)
            .map(|s| s.phase)
            .unwrap_or(SessionPhase::Idle)
    }

    pub fn is_busy(&self, thread_id: &str) -> bool {
        lock(&self.active).contains_key(thread_id)
    }

    /// Identity state of the current "new chat" intent.
    pub fn thread_state(&self) -> ThreadState {
        self.current_resolver().state()
    }

    /// Start a fresh "new chat" intent. The next send without a thread id
    /// creates a new thread; a creation already in flight still completes.
    pub fn new_chat(&self) {
        let fresh = Arc::new(ThreadResolver::new(
            Arc::clone(&self.backend),
            self.config.default_thread_name.clone(),
            self.events.clone(),
        ));
        *lock(&self.resolver) = fresh;
        debug!("New chat intent");
    }

    /// Signal the active send on `thread_id` to stop. Returns false when the
    /// thread is idle.
    pub fn cancel(&self, thread_id: &str) -> bool {
        match lock(&self.active).get(thread_id) {
            Some(session) => {
                info!(thread_id, session_id = %session.session_id, "Cancelling session");
                session.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Load a thread's persisted history into its log.
    ///
    /// Replaces whatever the log held. Refused while a send is active on the
    /// thread.
    pub async fn open_thread(&self, thread_id: &str) -> Result<OptimisticLog, OpenThreadError> {
        if self.is_busy(thread_id) {
            return Err(OpenThreadError::SessionBusy {
                thread_id: thread_id.to_string(),
            });
        }

        let history = self.backend.fetch_messages(thread_id).await?;
        let messages: Vec<Message> = history.into_iter().map(Message::from).collect();

        // Hold the session table so no send can start between check and seed.
        let active = lock(&self.active);
        if active.contains_key(thread_id) {
            return Err(OpenThreadError::SessionBusy {
                thread_id: thread_id.to_string(),
            });
        }
        let log = self.log(thread_id);
        debug!(thread_id, messages = messages.len(), "Seeding log from history");
        log.seed(messages);
        drop(active);

        Ok(log)
    }

    /// Send `text`, creating a thread first when `existing` is `None`.
    pub async fn send(
        &self,
        existing: Option<&str>,
        text: impl Into<String>,
        features: FeatureFlags,
    ) -> Result<SendReceipt, SendFailure> {
        self.send_with_cancel(existing, text, features, CancellationToken::new())
            .await
    }

    /// [`send`](Self::send) with a caller-owned cancellation token.
    ///
    /// Cancelling while the thread is being created lets the creation finish
    /// but appends nothing. Cancelling while streaming follows the configured
    /// [`CancelPolicy`].
    pub async fn send_with_cancel(
        &self,
        existing: Option<&str>,
        text: impl Into<String>,
        features: FeatureFlags,
        cancel: CancellationToken,
    ) -> Result<SendReceipt, SendFailure> {
        let input = text.into();
        let session_id = Uuid::new_v4();
        let span = info_span!(
            "send",
            %session_id,
            thread_id = existing.unwrap_or("<new>"),
        );

        self.run_send(session_id, existing, input, features, cancel)
            .instrument(span)
            .await
    }

    async fn run_send(
        &self,
        session_id: Uuid,
        existing: Option<&str>,
        input: String,
        features: FeatureFlags,
        cancel: CancellationToken,
    ) -> Result<SendReceipt, SendFailure> {
        if input.trim().is_empty() {
            return Err(self.fail(SendError::EmptyInput, existing.map(str::to_string), input));
        }

        // A named thread is claimed before anything else happens to it.
        let early_lease = match existing {
            Some(id) => match self.acquire(id, session_id, &cancel) {
                Some(lease) => Some(lease),
                None => return Err(self.busy(id, input)),
            },
            None => None,
        };

        info!(phase = %SessionPhase::ResolvingThread, "Send started");
        let resolver = self.current_resolver();
        let handle = match resolver.resolve(existing).await {
            Ok(handle) => handle,
            Err(err) => {
                if let Some(lease) = &early_lease {
                    lease.set_phase(SessionPhase::RollingBack);
                }
                return Err(self.fail(SendError::ThreadCreationFailed(err), None, input));
            }
        };

        if cancel.is_cancelled() {
            info!(thread_id = %handle.id, "Cancelled before streaming");
            return Err(self.fail(SendError::Cancelled, Some(handle.id), input));
        }

        let lease = match early_lease {
            Some(lease) => lease,
            None => match self.acquire(&handle.id, session_id, &cancel) {
                Some(lease) => lease,
                None => return Err(self.busy(&handle.id, input)),
            },
        };

        // Only a send made for the "new chat" intent owes its navigation.
        let new_chat = existing.is_none().then_some(&*resolver);
        self.stream_into_log(&lease, &handle, new_chat, input, features, &cancel)
            .await
    }

    async fn stream_into_log(
        &self,
        lease: &SessionLease,
        handle: &ThreadHandle,
        new_chat: Option<&ThreadResolver>,
        input: String,
        features: FeatureFlags,
        cancel: &CancellationToken,
    ) -> Result<SendReceipt, SendFailure> {
        lease.set_phase(SessionPhase::Streaming);
        let log = self.log(&handle.id);
        let exchange = Exchange {
            lease,
            thread_id: &handle.id,
            log: &log,
            user_index: log.append_user(input.clone()),
            placeholder: log.append_placeholder(),
        };

        let request = SendRequest::new(handle.id.clone(), input.clone()).with_features(features);
        let mut write_error = None;
        let outcome = self
            .consumer
            .consume(&request, cancel, |text| {
                if write_error.is_none() {
                    if let Err(e) = log.set_content(exchange.placeholder, text) {
                        write_error = Some(e);
                    }
                }
            })
            .await;

        let error = match (outcome, write_error) {
            (_, Some(err)) => SendError::Log(err),
            (Ok(StreamOutcome::Completed(reply)), None) => {
                return self.commit(&exchange, new_chat, reply, false, input);
            }
            (Ok(StreamOutcome::Cancelled { partial }), None) => match self.config.cancel_policy {
                CancelPolicy::KeepPartial => {
                    return self.commit(&exchange, new_chat, partial, true, input);
                }
                CancelPolicy::Discard => SendError::Cancelled,
            },
            (Err(err), None) => SendError::StreamTransport(err),
        };

        self.roll_back(&exchange);
        Err(self.fail(error, Some(handle.id.clone()), input))
    }

    fn commit(
        &self,
        exchange: &Exchange<'_>,
        new_chat: Option<&ThreadResolver>,
        reply: String,
        cancelled: bool,
        input: String,
    ) -> Result<SendReceipt, SendFailure> {
        let Exchange {
            lease,
            thread_id,
            log,
            user_index,
            placeholder,
        } = *exchange;

        let committed = log
            .set_content(placeholder, reply.clone())
            .and_then(|_| log.commit(user_index))
            .and_then(|_| log.commit(placeholder));
        if let Err(err) = committed {
            self.roll_back(exchange);
            return Err(self.fail(SendError::Log(err), Some(thread_id.to_string()), input));
        }

        lease.set_phase(SessionPhase::Committing);
        info!(thread_id, cancelled, "Exchange committed");

        // The first exchange committed on a freshly created thread navigates
        // there, even when the send that started the creation did not commit.
        let navigate = new_chat.is_some_and(|resolver| resolver.claim_navigation(thread_id));
        let _ = self.events.send(SessionEvent::ThreadTouched {
            thread_id: thread_id.to_string(),
        });
        if navigate {
            let _ = self.events.send(SessionEvent::NavigateToThread {
                thread_id: thread_id.to_string(),
            });
        }

        Ok(SendReceipt {
            thread_id: thread_id.to_string(),
            reply,
            created_thread: navigate,
            cancelled,
        })
    }

    fn roll_back(&self, exchange: &Exchange<'_>) {
        exchange.lease.set_phase(SessionPhase::RollingBack);
        let removed = exchange.log.rollback(exchange.user_index);
        warn!(thread_id = exchange.thread_id, removed, "Rolled back speculative messages");
    }

    fn acquire(
        &self,
        thread_id: &str,
        session_id: Uuid,
        cancel: &CancellationToken,
    ) -> Option<SessionLease> {
        let mut active = lock(&self.active);
        if active.contains_key(thread_id) {
            return None;
        }
        active.insert(
            thread_id.to_string(),
            ActiveSession {
                session_id,
                phase: SessionPhase::ResolvingThread,
                cancel: cancel.clone(),
            },
        );
        Some(SessionLease {
            active: Arc::clone(&self.active),
            thread_id: thread_id.to_string(),
        })
    }

    fn busy(&self, thread_id: &str, input: String) -> SendFailure {
        self.fail(
            SendError::SessionBusy {
                thread_id: thread_id.to_string(),
            },
            Some(thread_id.to_string()),
            input,
        )
    }

    fn fail(&self, error: SendError, thread_id: Option<String>, input: String) -> SendFailure {
        warn!(
            code = error.error_code(),
            category = %error.category(),
            error = %error,
            "Send failed"
        );
        let _ = self.events.send(SessionEvent::SendFailed {
            thread_id,
            kind: error.kind(),
            input: input.clone(),
        });
        SendFailure::new(error, input)
    }

    fn current_resolver(&self) -> Arc<ThreadResolver> {
        Arc::clone(&lock(&self.resolver))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
