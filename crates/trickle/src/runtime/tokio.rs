use super::Scheduler;
use core::time::Duration;
use std::time::Instant;

/// An implementation of [`Scheduler`] backed by the ambient Tokio runtime.
///
/// Time is read from `tokio::time`, so sessions follow a paused or
/// auto-advancing test clock exactly like real timers.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep(&self, dur: Duration) {
        tokio::time::sleep(dur).await;
    }

    async fn yield_now(&self) {
        tokio::task::yield_now().await;
    }
}
