//! Thread list and lookup, kept separate from any active session.

use std::cmp::Reverse;
use std::collections::HashMap;

use chrono::Utc;

use crate::events::SessionEvent;
use crate::models::ThreadSummary;

/// Known threads, most recently active first.
#[derive(Debug, Default, Clone)]
pub struct ThreadRegistry {
    threads: HashMap<String, ThreadSummary>,
    /// Thread ids in display order
    order: Vec<String>,
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole list, e.g. with the backend's thread list.
    ///
    /// Ordered by `updated_at` descending; threads without a timestamp go last
    /// and keep their relative order.
    pub fn replace_all(&mut self, mut threads: Vec<ThreadSummary>) {
        threads.sort_by_key(|t| Reverse(t.updated_at));
        self.threads.clear();
        self.order.clear();
        for thread in threads {
            if self.threads.contains_key(&thread.id) {
                continue;
            }
            self.order.push(thread.id.clone());
            self.threads.insert(thread.id.clone(), thread);
        }
    }

    /// Put a thread at the front, replacing any entry with the same id.
    pub fn prepend(&mut self, thread: ThreadSummary) {
        self.order.retain(|id| id != &thread.id);
        self.order.insert(0, thread.id.clone());
        self.threads.insert(thread.id.clone(), thread);
    }

    /// Move a known thread to the front and stamp it as updated now.
    pub fn touch(&mut self, thread_id: &str) -> bool {
        let Some(thread) = self.threads.get_mut(thread_id) else {
            return false;
        };
        thread.updated_at = Some(Utc::now());
        self.order.retain(|id| id != thread_id);
        self.order.insert(0, thread_id.to_string());
        true
    }

    pub fn get(&self, thread_id: &str) -> Option<&ThreadSummary> {
        self.threads.get(thread_id)
    }

    /// Threads in display order.
    pub fn threads(&self) -> Vec<&ThreadSummary> {
        self.order
            .iter()
            .filter_map(|id| self.threads.get(id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Fold a session notification into the list.
    pub fn apply(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::ThreadCreated { thread } => self.prepend(thread.clone()),
            SessionEvent::ThreadTouched { thread_id } => {
                self.touch(thread_id);
            }
            SessionEvent::NavigateToThread { .. } | SessionEvent::SendFailed { .. } => {}
        }
    }
}
