//! Reply stream consumption.
//!
//! Opens the send exchange, decodes the body chunk by chunk and reports the
//! accumulated text after every chunk. Chunks are deltas; the callback always
//! receives the whole reply so far.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::backend::BackendClient;
use crate::error::StreamError;
use crate::models::SendRequest;

/// How a stream ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The server closed the stream; the full reply
    Completed(String),
    /// The caller cancelled between reads; what had arrived by then
    Cancelled { partial: String },
}

/// Consumes reply streams from the send endpoint.
#[derive(Debug, Clone)]
pub struct StreamConsumer {
    backend: Arc<BackendClient>,
    read_timeout: Option<Duration>,
}

impl StreamConsumer {
    pub fn new(backend: Arc<BackendClient>) -> Self {
        Self {
            backend,
            read_timeout: None,
        }
    }

    /// Bound opening the exchange and each chunk read; a wait that takes
    /// longer fails the stream.
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Run one exchange to completion, failure or cancellation.
    ///
    /// `on_token` is called with the cumulative text after each chunk that
    /// decodes to something, before the next read starts. On error nothing
    /// partial is returned.
    pub async fn consume<F>(
        &self,
        request: &SendRequest,
        cancel: &CancellationToken,
        mut on_token: F,
    ) -> Result<StreamOutcome, StreamError>
    where
        F: FnMut(&str),
    {
        if cancel.is_cancelled() {
            return Ok(StreamOutcome::Cancelled {
                partial: String::new(),
            });
        }

        let mut body = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Ok(StreamOutcome::Cancelled { partial: String::new() });
            }
            opened = self.bounded(self.backend.open_send_stream(request)) => opened??,
        };

        let mut decoder = Utf8Decoder::default();
        let mut accumulated = String::new();
        let mut chunks = 0usize;

        loop {
            if cancel.is_cancelled() {
                debug!(chunks, "Stream cancelled between reads");
                return Ok(StreamOutcome::Cancelled {
                    partial: accumulated,
                });
            }

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(chunks, "Stream cancelled while waiting for data");
                    return Ok(StreamOutcome::Cancelled { partial: accumulated });
                }
                next = self.bounded(body.next()) => next?,
            };

            let Some(chunk) = next else {
                break;
            };
            let bytes = chunk?;
            chunks += 1;

            let delta = decoder.decode(&bytes);
            debug!(chunk = chunks, bytes = bytes.len(), "Stream chunk");
            if delta.is_empty() {
                continue;
            }
            accumulated.push_str(&delta);
            on_token(&accumulated);
        }

        let tail = decoder.finish();
        if !tail.is_empty() {
            accumulated.push_str(&tail);
            on_token(&accumulated);
        }

        info!(chunks, chars = accumulated.chars().count(), "Stream completed");
        Ok(StreamOutcome::Completed(accumulated))
    }

    async fn bounded<T>(&self, wait: impl Future<Output = T>) -> Result<T, StreamError> {
        match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| StreamError::ReadTimeout {
                    secs: whole_secs(limit),
                }),
            None => Ok(wait.await),
        }
    }
}

/// `limit` in seconds, rounded up.
fn whole_secs(limit: Duration) -> u64 {
    limit
        .as_secs()
        .saturating_add(u64::from(limit.subsec_nanos() > 0))
}

/// Incremental UTF-8 decoder.
///
/// A character split across chunks is held back until its remaining bytes
/// arrive. Invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Decode as much of `pending + chunk` as is complete.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match err.error_len() {
                        Some(invalid) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + invalid);
                        }
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            self.pending.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush whatever is still held back at end of stream.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}
