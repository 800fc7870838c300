//! The paced chunked-stream session.
//!
//! A [`StreamSession`] owns everything one streamed response needs: the chunk
//! size, the remaining chunk budget, the transport ([`ResponseSink`]) and the
//! runtime handle ([`Scheduler`]). [`StreamSession::run`] walks it through
//!
//! ```text
//! Initializing -> Streaming -> Finalizing -> Closed
//!                     |
//!                     +-> Failed
//! ```
//!
//! One iteration of `Streaming` generates a chunk, flushes it and waits for
//! the acknowledgement, then asks the [`Pacer`] how to continue: either after
//! a timer, or right away after yielding to the runtime. The loop never
//! recurses, so a session with a fast transport runs in constant stack and
//! hands the thread back to other sessions on every chunk.

use crate::{
    Error, Pacer, PacingDecision, ResponseHead, ResponseSink, Result, Scheduler, StreamParams,
    make_chunk,
};
use tokio_util::sync::CancellationToken;

#[cfg(all(test, feature = "async-tokio"))]
mod tests;

/// `Server` header value used unless [`StreamSession::with_server_name`] says
/// otherwise.
pub const DEFAULT_SERVER_NAME: &str = "trickle";

/// Lifecycle of a [`StreamSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed; headers not yet written.
    Initializing,
    /// Headers written; chunks are being produced and flushed.
    Streaming,
    /// The final chunk was handed over and the body marked complete.
    Finalizing,
    /// The transport took the final chunk. Terminal.
    Closed,
    /// A flush failed or the session was cancelled. Terminal.
    Failed,
}

impl SessionState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

/// How a session ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Every chunk was delivered and the response finalized.
    Completed { chunks: u64, bytes: u64 },
    /// The transport failed; the client sees a truncated body.
    Failed(Error),
    /// The session was torn down while a flush or timer was pending.
    Cancelled,
}

/// Counters describing what a session has delivered so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub chunks_sent: u64,
    pub bytes_sent: u64,
}

/// State of one in-progress streamed response.
pub struct StreamSession<K, S> {
    chunk_size: usize,
    remaining_chunks: usize,
    sink: K,
    scheduler: S,
    pacer: Pacer,
    cancel: CancellationToken,
    server_name: String,
    state: SessionState,
    stats: SessionStats,
    outcome: Option<SessionOutcome>,
}

impl<K, S> StreamSession<K, S>
where
    K: ResponseSink,
    S: Scheduler,
{
    /// Creates a session for already-validated `params`.
    ///
    /// Both `chunk_size` and `chunk_count` are expected to be non-zero, which
    /// [`resolve`](crate::resolve) guarantees. A session built with a zero
    /// count still writes its head and finishes with a single chunk.
    pub fn new(params: StreamParams, sink: K, scheduler: S) -> Self {
        Self {
            chunk_size: params.chunk_size,
            remaining_chunks: params.chunk_count.max(1),
            sink,
            scheduler,
            pacer: Pacer::default(),
            cancel: CancellationToken::new(),
            server_name: DEFAULT_SERVER_NAME.to_string(),
            state: SessionState::Initializing,
            stats: SessionStats::default(),
            outcome: None,
        }
    }

    #[must_use]
    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    /// Ties the session to `token`. Cancelling it stops the session at its
    /// next pending flush or timer.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub fn with_server_name(mut self, server: impl Into<String>) -> Self {
        self.server_name = server.into();
        self
    }

    pub const fn state(&self) -> SessionState {
        self.state
    }

    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Chunks not yet acknowledged by the transport.
    pub const fn remaining_chunks(&self) -> usize {
        self.remaining_chunks
    }

    pub const fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Streams the whole response and reports how it ended.
    ///
    /// Failures never escape as errors: they end the session and are
    /// reflected in the returned [`SessionOutcome`]. Calling `run` again on a
    /// terminal session returns immediately without touching the transport.
    pub async fn run(&mut self) -> SessionOutcome {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }

        let outcome = match self.drive().await {
            Ok(()) => {
                self.state = SessionState::Closed;
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    chunks = self.stats.chunks_sent,
                    bytes = self.stats.bytes_sent,
                    "Stream complete"
                );
                SessionOutcome::Completed {
                    chunks: self.stats.chunks_sent,
                    bytes: self.stats.bytes_sent,
                }
            }
            Err(Error::Cancelled) => {
                self.state = SessionState::Failed;
                #[cfg(feature = "tracing")]
                tracing::debug!(remaining = self.remaining_chunks, "Stream cancelled");
                SessionOutcome::Cancelled
            }
            Err(e) => {
                self.state = SessionState::Failed;
                #[cfg(feature = "tracing")]
                tracing::debug!(remaining = self.remaining_chunks, "Stream failed: {e}");
                SessionOutcome::Failed(e)
            }
        };

        self.outcome = Some(outcome.clone());
        outcome
    }

    async fn drive(&mut self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.sink
            .write_head(ResponseHead::new(self.server_name.as_str()))?;
        self.state = SessionState::Streaming;

        loop {
            let chunk = make_chunk(self.chunk_size);
            let len = chunk.len() as u64;

            if self.remaining_chunks == 1 {
                self.state = SessionState::Finalizing;
                self.cancel
                    .run_until_cancelled(self.sink.finish(chunk))
                    .await
                    .ok_or(Error::Cancelled)??;
                self.record_ack(len);
                return Ok(());
            }

            let dispatched_at = self.scheduler.now();
            self.cancel
                .run_until_cancelled(self.sink.flush(chunk))
                .await
                .ok_or(Error::Cancelled)??;
            self.record_ack(len);

            match self.pacer.decide(dispatched_at, self.scheduler.now()) {
                PacingDecision::ContinueAfter(delay) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!("Next chunk in {delay:?}");
                    self.cancel
                        .run_until_cancelled(self.scheduler.sleep(delay))
                        .await
                        .ok_or(Error::Cancelled)?;
                }
                PacingDecision::ContinueNow => {
                    self.scheduler.yield_now().await;
                    if self.cancel.is_cancelled() {
                        return Err(Error::Cancelled);
                    }
                }
            }
        }
    }

    fn record_ack(&mut self, len: u64) {
        self.remaining_chunks -= 1;
        self.stats.chunks_sent += 1;
        self.stats.bytes_sent += len;
    }
}
