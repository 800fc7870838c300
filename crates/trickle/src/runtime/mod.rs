use core::time::Duration;
use std::time::Instant;

#[cfg(feature = "async-tokio")]
mod tokio;
#[cfg(feature = "async-tokio")]
pub use tokio::*;

/// A handle to the runtime a session runs on.
///
/// Sessions receive their scheduler at construction instead of reaching for a
/// global event loop. It supplies the clock used for pacing, one-shot timers,
/// and a cooperative yield used to continue without recursing.
///
/// Futures are required to be `Send` so sessions can be spawned on a
/// multi-threaded runtime.
pub trait Scheduler: Clone + Send + Sync + 'static {
    /// Current time according to the runtime's clock.
    fn now(&self) -> Instant;

    /// Resolves once `dur` has elapsed.
    fn sleep(&self, dur: Duration) -> impl Future<Output = ()> + Send;

    /// Gives other tasks on the runtime a chance to run, then resolves.
    fn yield_now(&self) -> impl Future<Output = ()> + Send;
}
