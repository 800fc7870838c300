use axum::{
    body::Body,
    http::{
        StatusCode,
        header::{CONTENT_TYPE, DATE, SERVER},
    },
    response::Response,
};
use bytes::Bytes;
use core::time::Duration;
use futures::{StreamExt, future, stream};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use trickle::{Error, ResponseHead, ResponseSink, Result};

/// One chunk on its way into the response body, with the acknowledgement
/// fired once hyper pulls it from the body stream.
struct Frame {
    data: Bytes,
    ack: oneshot::Sender<()>,
}

impl Frame {
    fn deliver(self) -> Result<Bytes> {
        // The session may have given up waiting; nothing to do then.
        let _ = self.ack.send(());
        Ok(self.data)
    }
}

/// Error item ending a body whose sink was dropped before `finish` completed.
fn aborted(_: oneshot::error::RecvError) -> Result<Bytes> {
    Err(Error::Transport {
        context: "Stream ended before its final chunk".to_string(),
    })
}

/// [`ResponseSink`] that feeds an axum response body.
///
/// Created together with a [`PendingResponse`] by [`HttpSink::channel`]. The
/// body channel holds a single frame, so at most one chunk is ever queued
/// ahead of the transport.
///
/// The body only ends cleanly after [`ResponseSink::finish`] succeeds. A sink
/// dropped at any earlier point (failure, timeout, cancellation) ends the body
/// with an error, so hyper aborts the connection instead of writing the
/// chunked terminator.
pub struct HttpSink {
    head: Option<oneshot::Sender<ResponseHead>>,
    body: Option<mpsc::Sender<Frame>>,
    done: Option<oneshot::Sender<()>>,
    write_timeout: Duration,
}

/// The request handler's half of an [`HttpSink`].
pub struct PendingResponse {
    head: oneshot::Receiver<ResponseHead>,
    body: mpsc::Receiver<Frame>,
    done: oneshot::Receiver<()>,
}

impl HttpSink {
    /// Creates a connected sink / response pair. Every flush must be
    /// acknowledged within `write_timeout`.
    pub fn channel(write_timeout: Duration) -> (Self, PendingResponse) {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(1);
        let (done_tx, done_rx) = oneshot::channel();
        (
            Self {
                head: Some(head_tx),
                body: Some(body_tx),
                done: Some(done_tx),
                write_timeout,
            },
            PendingResponse {
                head: head_rx,
                body: body_rx,
                done: done_rx,
            },
        )
    }

    async fn enqueue(&self, data: Bytes) -> Result<oneshot::Receiver<()>> {
        let body = self.body.as_ref().ok_or_else(|| Error::Transport {
            context: "Response body already finished".to_string(),
        })?;
        let (ack, acked) = oneshot::channel();
        body.send(Frame { data, ack })
            .await
            .map_err(|_| Error::Transport {
                context: "Client disconnected".to_string(),
            })?;
        Ok(acked)
    }

    async fn with_write_limit<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.write_timeout, fut)
            .await
            .map_err(|_| Error::WriteTimeout {
                limit: self.write_timeout,
            })?
    }
}

async fn acknowledged(acked: oneshot::Receiver<()>) -> Result<()> {
    acked.await.map_err(|_| Error::Transport {
        context: "Client disconnected before the chunk was sent".to_string(),
    })
}

impl ResponseSink for HttpSink {
    fn write_head(&mut self, head: ResponseHead) -> Result<()> {
        let tx = self.head.take().ok_or_else(|| Error::Transport {
            context: "Response head already written".to_string(),
        })?;
        tx.send(head).map_err(|_| Error::Transport {
            context: "Request dropped before the response head was written".to_string(),
        })
    }

    async fn flush(&mut self, chunk: Bytes) -> Result<()> {
        self.with_write_limit(async {
            let acked = self.enqueue(chunk).await?;
            acknowledged(acked).await
        })
        .await
    }

    async fn finish(&mut self, last: Bytes) -> Result<()> {
        let acked = self.with_write_limit(self.enqueue(last)).await;
        // Closing the channel ends the chunked body after the last frame.
        self.body = None;
        let acked = acked?;
        self.with_write_limit(acknowledged(acked)).await?;
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
        Ok(())
    }
}

impl PendingResponse {
    /// Waits for the session to write its head and builds the streaming
    /// response around the body channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the session ended before writing a
    /// head, or the head is not a valid set of HTTP header values.
    pub async fn into_response(self) -> Result<Response> {
        let head = self.head.await.map_err(|_| Error::Transport {
            context: "Stream ended before writing the response head".to_string(),
        })?;

        let finished = stream::once(self.done)
            .filter_map(|done| future::ready(done.err().map(aborted)));
        let body = ReceiverStream::new(self.body)
            .map(Frame::deliver)
            .chain(finished);

        Response::builder()
            .status(StatusCode::OK)
            .header(SERVER, head.server)
            .header(DATE, head.date)
            .header(CONTENT_TYPE, head.content_type)
            .body(Body::from_stream(body))
            .map_err(|e| Error::Transport {
                context: format!("Invalid response head: {e}"),
            })
    }
}
