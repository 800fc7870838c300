//! HTTP service implementation.
//!
//! This module contains the axum router, request handlers and the mapping
//! from [`trickle::Error`] to HTTP responses. Accepted requests are turned
//! into stream sessions spawned on the runtime.
//!
//! ## Structure
//!
//! - [`handler`] - HTTP entry point (`StreamService`).

pub mod handler;
