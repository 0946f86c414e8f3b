//! Optimistic message log.
//!
//! The log is an ordered list of [`Message`]s that a presentation layer can
//! render at any time. Every mutation builds a new list and swaps it in whole,
//! so a reader holding a snapshot never sees a half-applied write. Readers that
//! want to follow changes call [`OptimisticLog::subscribe`].

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::LogError;
use crate::models::Message;

/// Immutable view of the log at one point in time.
pub type LogSnapshot = Arc<Vec<Message>>;

/// Shared handle to one thread's message log.
///
/// Clones refer to the same log.
#[derive(Debug, Clone)]
pub struct OptimisticLog {
    tx: Arc<watch::Sender<LogSnapshot>>,
}

impl Default for OptimisticLog {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimisticLog {
    pub fn new() -> Self {
        Self::with_messages(Vec::new())
    }

    /// Log seeded with already-persisted messages.
    pub fn with_messages(messages: Vec<Message>) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(messages));
        Self { tx: Arc::new(tx) }
    }

    /// Current contents.
    pub fn snapshot(&self) -> LogSnapshot {
        self.tx.borrow().clone()
    }

    /// Receiver notified after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<LogSnapshot> {
        self.tx.subscribe()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the whole log, e.g. with freshly fetched history.
    pub fn seed(&self, messages: Vec<Message>) {
        self.tx.send_replace(Arc::new(messages));
    }

    /// Append an uncommitted user message and return its index.
    pub fn append_user(&self, content: impl Into<String>) -> usize {
        self.push(Message::optimistic_user(content))
    }

    /// Append an empty uncommitted assistant message and return its index.
    pub fn append_placeholder(&self) -> usize {
        self.push(Message::placeholder())
    }

    /// Overwrite the content at `index`. The message must still be uncommitted.
    ///
    /// `content` replaces what was there; streamed replies pass the full text
    /// accumulated so far.
    pub fn set_content(&self, index: usize, content: impl Into<String>) -> Result<(), LogError> {
        let content = content.into();
        self.update(index, |message| message.content = content)
    }

    /// Mark the message at `index` final. Committing twice is a no-op.
    pub fn commit(&self, index: usize) -> Result<(), LogError> {
        let mut result = Ok(());
        self.tx.send_if_modified(|current| match current.get(index) {
            None => {
                result = Err(LogError::OutOfRange {
                    index,
                    len: current.len(),
                });
                false
            }
            Some(message) if message.committed => false,
            Some(_) => {
                let mut next = (**current).clone();
                next[index].committed = true;
                *current = Arc::new(next);
                true
            }
        });
        result
    }

    /// Remove every message from `from` to the end.
    ///
    /// Returns how many messages were removed; `from` at or past the end
    /// removes nothing.
    pub fn rollback(&self, from: usize) -> usize {
        let mut removed = 0;
        self.tx.send_if_modified(|current| {
            if from >= current.len() {
                return false;
            }
            removed = current.len() - from;
            *current = Arc::new(current[..from].to_vec());
            true
        });
        removed
    }

    fn push(&self, message: Message) -> usize {
        let mut index = 0;
        self.tx.send_modify(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend_from_slice(current);
            index = next.len();
            next.push(message);
            *current = Arc::new(next);
        });
        index
    }

    fn update(&self, index: usize, apply: impl FnOnce(&mut Message)) -> Result<(), LogError> {
        let mut result = Ok(());
        self.tx.send_if_modified(|current| match current.get(index) {
            None => {
                result = Err(LogError::OutOfRange {
                    index,
                    len: current.len(),
                });
                false
            }
            Some(message) if message.committed => {
                result = Err(LogError::Committed { index });
                false
            }
            Some(_) => {
                let mut next = (**current).clone();
                apply(&mut next[index]);
                *current = Arc::new(next);
                true
            }
        });
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageRole;

    #[test]
    fn test_append_returns_indices() {
        let log = OptimisticLog::new();
        assert_eq!(log.append_user("Hello"), 0);
        assert_eq!(log.append_placeholder(), 1);

        let snapshot = log.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].role, MessageRole::User);
        assert!(!snapshot[0].committed);
        assert!(snapshot[1].is_placeholder());
    }

    #[test]
    fn test_set_content_replaces() {
        let log = OptimisticLog::new();
        let idx = log.append_placeholder();
        log.set_content(idx, "Hi").unwrap();
        log.set_content(idx, "Hi there").unwrap();
        assert_eq!(log.snapshot()[idx].content, "Hi there");
    }

    #[test]
    fn test_set_content_rejects_committed_and_out_of_range() {
        let log = OptimisticLog::new();
        let idx = log.append_user("x");
        log.commit(idx).unwrap();

        assert_eq!(log.set_content(idx, "y"), Err(LogError::Committed { index: 0 }));
        assert_eq!(
            log.set_content(5, "y"),
            Err(LogError::OutOfRange { index: 5, len: 1 })
        );
        assert_eq!(log.snapshot()[0].content, "x");
    }

    #[test]
    fn test_commit_is_idempotent() {
        let log = OptimisticLog::new();
        let idx = log.append_user("x");
        log.commit(idx).unwrap();
        log.commit(idx).unwrap();
        assert!(log.snapshot()[idx].committed);
        assert!(log.commit(3).is_err());
    }

    #[test]
    fn test_rollback_truncates() {
        let log = OptimisticLog::with_messages(vec![Message::committed(MessageRole::User, "old")]);
        let before = log.snapshot();

        let user = log.append_user("new");
        log.append_placeholder();
        assert_eq!(log.rollback(user), 2);
        assert_eq!(log.snapshot(), before);

        assert_eq!(log.rollback(10), 0);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_snapshots_are_not_torn() {
        let log = OptimisticLog::new();
        let idx = log.append_placeholder();
        let held = log.snapshot();

        log.set_content(idx, "streamed").unwrap();

        // The earlier snapshot is untouched by later writes.
        assert_eq!(held[idx].content, "");
        assert_eq!(log.snapshot()[idx].content, "streamed");
    }

    #[tokio::test]
    async fn test_subscribers_see_each_write() {
        let log = OptimisticLog::new();
        let mut rx = log.subscribe();

        log.append_user("a");
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().len(), 1);

        log.rollback(0);
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let log = OptimisticLog::new();
        let other = log.clone();
        other.append_user("shared");
        assert_eq!(log.len(), 1);
    }
}
