use core::time::Duration;
use std::time::Instant;

/// Default minimum interval between two chunk dispatches.
pub const DEFAULT_PACING_INTERVAL: Duration = Duration::from_secs(1);

/// What a session does after a chunk flush has been acknowledged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacingDecision {
    /// The interval has already elapsed; continue after yielding to the
    /// runtime.
    ContinueNow,
    /// Wait this long before producing the next chunk.
    ContinueAfter(Duration),
}

/// Enforces a minimum interval between successive chunk dispatches.
///
/// Each decision is anchored to the dispatch time of the chunk that was just
/// acknowledged, not to a global schedule. An iteration that overruns the
/// interval is followed immediately by the next one, and nothing is owed
/// afterwards: the pacer never tries to catch up with bursts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pacer {
    interval: Duration,
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(DEFAULT_PACING_INTERVAL)
    }
}

impl Pacer {
    pub const fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Decides how to continue given when the last chunk was dispatched and
    /// the current time.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::{Duration, Instant};
    /// use trickle::{Pacer, PacingDecision};
    ///
    /// let pacer = Pacer::new(Duration::from_secs(1));
    /// let t0 = Instant::now();
    ///
    /// assert_eq!(
    ///     pacer.decide(t0, t0 + Duration::from_millis(300)),
    ///     PacingDecision::ContinueAfter(Duration::from_millis(700)),
    /// );
    /// assert_eq!(
    ///     pacer.decide(t0, t0 + Duration::from_secs(2)),
    ///     PacingDecision::ContinueNow,
    /// );
    /// ```
    pub fn decide(&self, dispatched_at: Instant, now: Instant) -> PacingDecision {
        let elapsed = now.saturating_duration_since(dispatched_at);
        if elapsed < self.interval {
            PacingDecision::ContinueAfter(self.interval - elapsed)
        } else {
            PacingDecision::ContinueNow
        }
    }
}
