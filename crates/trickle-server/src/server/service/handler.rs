//! HTTP handlers for paced chunked streams.
//!
//! This module defines [`StreamService`], the axum-facing side of the server.
//! It resolves request paths into stream parameters, admits the request
//! through the [`SessionRegistry`], and spawns one [`StreamSession`] per
//! accepted request.
//!
//! ## Responsibilities
//!
//! - Route `GET /`, `GET /{size}` and `GET /{size}/{count}`.
//! - Reject invalid or oversized requests before any streaming starts.
//! - Spawn each session as its own task, wired to an [`HttpSink`].
//! - Report health and refuse new streams during shutdown.

use crate::server::{
    config::ServerConfig,
    registry::SessionRegistry,
    streaming::sink::HttpSink,
    telemetry::{
        add_bytes_sent, add_chunks_sent, decrement_streams_inflight, increment_requests,
        increment_stream_errors, increment_streams_inflight, record_chunk_size,
        record_stream_duration,
    },
};
use axum::{
    Router,
    extract::State,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
};
use std::sync::Arc;
use tracing::Instrument;
use trickle::{
    Error, Pacer, SessionOutcome, StreamParams, StreamSession, TokioScheduler, resolve,
};

/// HTTP service streaming paced synthetic payloads.
///
/// Cheap to clone; all clones share one [`SessionRegistry`].
#[derive(Clone)]
pub struct StreamService {
    config: ServerConfig,
    registry: Arc<SessionRegistry>,
}

impl StreamService {
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(SessionRegistry::new(config.shutdown_timeout));
        Self { config, registry }
    }

    /// Builds the axum router serving this service.
    pub fn router(self) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/", get(stream))
            .route("/{size}", get(stream))
            .route("/{size}/{count}", get(stream))
            .with_state(self)
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Refuses new streams, drains in-flight ones and cancels the rest.
    pub async fn shutdown(&self) {
        self.registry.shutdown().await;
    }

    /// Starts a session for `params` and returns the streaming response once
    /// the session has written its head.
    async fn start(&self, params: StreamParams) -> Result<Response, Error> {
        let guard = self.registry.admit()?;

        increment_requests();
        record_chunk_size(params.chunk_size as f64);
        increment_streams_inflight();

        let (sink, pending) = HttpSink::channel(self.config.write_timeout);
        let mut session = StreamSession::new(params, sink, TokioScheduler)
            .with_pacer(Pacer::new(self.config.pacing_interval))
            .with_cancellation(guard.token())
            .with_server_name(self.config.server_name.as_str());

        let span = tracing::info_span!(
            "stream",
            chunk_size = params.chunk_size,
            chunk_count = params.chunk_count
        );
        let fut = async move {
            let start = tokio::time::Instant::now();
            let outcome = session.run().await;
            let stats = session.stats();
            add_chunks_sent(stats.chunks_sent);
            add_bytes_sent(stats.bytes_sent);

            match outcome {
                SessionOutcome::Completed { chunks, bytes } => {
                    record_stream_duration(start.elapsed().as_millis() as f64);
                    tracing::info!("Streamed {chunks} chunks ({bytes} bytes)");
                }
                SessionOutcome::Failed(e) => {
                    increment_stream_errors();
                    tracing::warn!("Stream aborted after {} chunks: {e}", stats.chunks_sent);
                }
                SessionOutcome::Cancelled => {
                    increment_stream_errors();
                    tracing::debug!("Stream cancelled after {} chunks", stats.chunks_sent);
                }
            }

            decrement_streams_inflight();
            drop(guard);
        };

        tokio::spawn(fut.instrument(span));

        pending.into_response().await
    }
}

async fn stream(State(service): State<StreamService>, uri: Uri) -> Result<Response, Rejection> {
    let params = resolve(uri.path())?;
    params.check(&service.config.limits)?;
    service.start(params).await.map_err(Rejection)
}

async fn health(State(service): State<StreamService>) -> (StatusCode, &'static str) {
    if service.registry.is_shutting_down() {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT_SERVING")
    } else {
        (StatusCode::OK, "SERVING")
    }
}

/// A request that ends without a stream.
#[derive(Debug)]
pub struct Rejection(pub Error);

impl From<Error> for Rejection {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::UnmatchedPath { .. } => StatusCode::NOT_FOUND,
            Error::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            Error::ServiceShutdown | Error::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            Error::Transport { .. } | Error::WriteTimeout { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if self.0.is_rejection() {
            tracing::debug!("Request rejected: {}", self.0);
        } else {
            tracing::warn!("Request failed: {}", self.0);
        }

        (status, self.0.to_string()).into_response()
    }
}
