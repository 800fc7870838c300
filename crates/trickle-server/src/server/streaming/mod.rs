//! Transport glue between stream sessions and axum responses.
//!
//! - [`sink`] - [`HttpSink`](sink::HttpSink), the [`trickle::ResponseSink`]
//!   backed by a chunked response body.

pub mod sink;
