//! Paced chunked-stream sessions.
//!
//! `trickle` produces long-lived, rate-limited streamed responses: a synthetic
//! payload is emitted as a sequence of fixed-size chunks, no faster than one
//! chunk per pacing interval, until a chunk budget is exhausted.
//!
//! The crate is transport-agnostic. A [`StreamSession`] drives a
//! [`ResponseSink`] (whatever hands bytes to the client) using a
//! [`Scheduler`] (whatever provides time, timers and cooperative yielding).
//! With the `async-tokio` feature, [`TokioScheduler`] plugs sessions into a
//! Tokio runtime.
//!
//! ```
//! use trickle::{resolve, StreamParams};
//!
//! let params = resolve("/5k/3").unwrap();
//! assert_eq!(params, StreamParams { chunk_size: 5120, chunk_count: 3 });
//! ```

mod error;
mod pacing;
mod params;
mod payload;
mod runtime;
mod session;
mod sink;

pub use crate::error::*;
pub use crate::pacing::*;
pub use crate::params::*;
pub use crate::payload::*;
pub use crate::runtime::*;
pub use crate::session::*;
pub use crate::sink::*;
