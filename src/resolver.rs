//! Thread identity resolution.
//!
//! A send either names an existing thread or asks for one to be created. For
//! one "new chat" intent there is at most one creation request in flight:
//! callers arriving while it is pending await the same request.

use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::backend::BackendClient;
use crate::error::BackendError;
use crate::events::SessionEvent;
use crate::models::ThreadSummary;
use crate::traits::HttpError;

type Creation = Shared<BoxFuture<'static, Result<ThreadSummary, BackendError>>>;

/// Where a "new chat" intent is in acquiring its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadState {
    /// No id and no request issued
    Unresolved,
    /// A creation request is in flight
    Pending,
    /// Id known and usable; never changes afterwards
    Resolved { id: String },
}

/// Result of a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadHandle {
    pub id: String,
    /// True only for the caller whose request created the thread
    pub created: bool,
}

impl ThreadHandle {
    pub fn existing(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created: false,
        }
    }
}

enum Slot {
    Unresolved,
    Pending(Creation),
    Resolved {
        thread: ThreadSummary,
        /// No exchange has been committed on the new thread yet
        navigation_owed: bool,
    },
}

/// Resolves thread ids for one logical "new chat" intent.
pub struct ThreadResolver {
    backend: Arc<BackendClient>,
    thread_name: Option<String>,
    events: broadcast::Sender<SessionEvent>,
    slot: Arc<Mutex<Slot>>,
}

impl ThreadResolver {
    pub fn new(
        backend: Arc<BackendClient>,
        thread_name: Option<String>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            backend,
            thread_name,
            events,
            slot: Arc::new(Mutex::new(Slot::Unresolved)),
        }
    }

    pub fn state(&self) -> ThreadState {
        match &*lock(&self.slot) {
            Slot::Unresolved => ThreadState::Unresolved,
            Slot::Pending(_) => ThreadState::Pending,
            Slot::Resolved { thread, .. } => ThreadState::Resolved {
                id: thread.id.clone(),
            },
        }
    }

    /// Claim the navigation owed to the thread this intent created.
    ///
    /// Returns true exactly once: for the first caller that commits an
    /// exchange on the created thread, whichever send started the creation.
    pub fn claim_navigation(&self, thread_id: &str) -> bool {
        match &mut *lock(&self.slot) {
            Slot::Resolved {
                thread,
                navigation_owed,
            } if *navigation_owed && thread.id == thread_id => {
                *navigation_owed = false;
                true
            }
            _ => false,
        }
    }

    /// Resolve the thread a send should target.
    ///
    /// An `existing` id is returned as-is without a network call. Otherwise the
    /// resolved id is reused, a pending creation is joined, or a new creation
    /// is started. A failed creation puts the intent back to
    /// [`ThreadState::Unresolved`] and every caller awaiting it gets the error.
    ///
    /// The creation request runs on its own task, so dropping the returned
    /// future does not abort it.
    pub async fn resolve(&self, existing: Option<&str>) -> Result<ThreadHandle, BackendError> {
        if let Some(id) = existing {
            return Ok(ThreadHandle::existing(id));
        }

        let (creation, initiator) = {
            let mut slot = lock(&self.slot);
            match &*slot {
                Slot::Resolved { thread, .. } => {
                    return Ok(ThreadHandle::existing(thread.id.clone()))
                }
                Slot::Pending(creation) => {
                    debug!("Joining pending thread creation");
                    (creation.clone(), false)
                }
                Slot::Unresolved => {
                    let creation = self.start_creation();
                    *slot = Slot::Pending(creation.clone());
                    (creation, true)
                }
            }
        };

        let thread = creation.await?;
        Ok(ThreadHandle {
            id: thread.id,
            created: initiator,
        })
    }

    fn start_creation(&self) -> Creation {
        let backend = Arc::clone(&self.backend);
        let name = self.thread_name.clone();
        let events = self.events.clone();
        let slot = Arc::clone(&self.slot);

        let task = tokio::spawn(async move {
            let result = backend.create_thread(name.as_deref()).await;
            let mut slot = lock(&slot);
            match &result {
                Ok(thread) => {
                    info!(thread_id = %thread.id, "Thread resolved");
                    *slot = Slot::Resolved {
                        thread: thread.clone(),
                        navigation_owed: true,
                    };
                    let _ = events.send(SessionEvent::ThreadCreated {
                        thread: thread.clone(),
                    });
                }
                Err(err) => {
                    warn!(error = %err, "Thread creation failed");
                    *slot = Slot::Unresolved;
                }
            }
            result
        });

        task.map(|joined| {
            joined.unwrap_or_else(|e| {
                Err(BackendError::Http(HttpError::Other(format!(
                    "thread creation task failed: {}",
                    e
                ))))
            })
        })
        .boxed()
        .shared()
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}
