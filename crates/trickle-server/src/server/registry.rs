//! Tracking of in-flight stream sessions.
//!
//! Every accepted request is admitted through the [`SessionRegistry`], which
//! counts live sessions, hands each one a cancellation token, and refuses new
//! sessions once shutdown has started. Sessions never share mutable state with
//! each other; the registry only sees admissions and releases.

use core::time::Duration;
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use trickle::Error;

pub struct SessionRegistry {
    inflight: AtomicUsize,
    shutting_down: AtomicBool,
    shutdown_token: CancellationToken,
    shutdown_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(shutdown_timeout: Duration) -> Self {
        Self {
            inflight: AtomicUsize::new(0),
            shutting_down: AtomicBool::new(false),
            shutdown_token: CancellationToken::new(),
            shutdown_timeout,
        }
    }

    /// Registers a new session.
    ///
    /// The returned [`SessionGuard`] keeps the session counted until it is
    /// dropped, and carries the token the session must observe.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] once [`shutdown`](Self::shutdown)
    /// has been called.
    pub fn admit(self: &Arc<Self>) -> Result<SessionGuard, Error> {
        if self.is_shutting_down() {
            return Err(Error::ServiceShutdown);
        }

        self.inflight.fetch_add(1, Ordering::AcqRel);
        Ok(SessionGuard {
            registry: Arc::clone(self),
            token: self.shutdown_token.child_token(),
        })
    }

    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::Acquire)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Stops admitting sessions and waits for the live ones to end.
    ///
    /// - Refuses new sessions.
    /// - Waits up to the configured timeout for in-flight sessions to drain.
    /// - Cancels whatever is still running.
    pub async fn shutdown(&self) {
        // === Phase 0: Stop accepting new requests ===
        tracing::info!("Refusing new streams");
        self.shutting_down.store(true, Ordering::Release);

        // === Phase 1: Wait for in-flight streams to drain ===
        tracing::info!("Draining in-flight streams ({} active)", self.inflight());
        let drain_result = timeout(self.shutdown_timeout, async {
            while self.inflight() > 0 {
                sleep(Duration::from_millis(100)).await;
            }
        })
        .await;

        match drain_result {
            Ok(()) => tracing::debug!("All in-flight streams drained successfully"),
            Err(_) => tracing::warn!(
                "Graceful drain timed out ({} streams still active)",
                self.inflight()
            ),
        }

        // === Phase 2: Cancel any remaining streams ===
        tracing::debug!("Cancelling remaining streams via shutdown token");
        self.shutdown_token.cancel();
    }
}

/// Proof of admission for one session. Releases its slot on drop.
pub struct SessionGuard {
    registry: Arc<SessionRegistry>,
    token: CancellationToken,
}

impl SessionGuard {
    /// Token that fires when the registry cancels outstanding sessions.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.inflight.fetch_sub(1, Ordering::AcqRel);
    }
}
