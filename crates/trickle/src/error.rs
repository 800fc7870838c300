//! Error types for stream sessions and request resolution.
//!
//! ## Error Cases
//! - `UnmatchedPath`: the request path has no recognized shape.
//! - `InvalidRequest`: the path matched but its parameters are unusable (zero
//!   chunk size or count, overflow, or above the configured limits).
//! - `Transport`: the transport failed to take a chunk (typically the client
//!   went away).
//! - `WriteTimeout`: the transport did not acknowledge a chunk within its
//!   write time limit.
//! - `Cancelled`: a pending flush or timer was cancelled by session teardown.
//! - `ServiceShutdown`: a request arrived while the service was shutting down.

use core::time::Duration;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for stream sessions.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// No route shape matched the request path.
    #[error("No stream route matches path `{path}`")]
    UnmatchedPath { path: String },

    /// The request matched a route but its parameters were rejected.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The transport reported a failure while sending.
    #[error("Transport error: {context}")]
    Transport { context: String },

    /// The transport did not acknowledge a write in time.
    #[error("Response write exceeded the {limit:?} time limit")]
    WriteTimeout { limit: Duration },

    /// The session was torn down while a flush or timer was pending.
    #[error("Session cancelled")]
    Cancelled,

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl Error {
    /// Returns `true` for errors raised before any streaming state exists.
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::UnmatchedPath { .. } | Self::InvalidRequest { .. } | Self::ServiceShutdown
        )
    }
}
