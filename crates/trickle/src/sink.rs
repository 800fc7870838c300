use crate::Result;
use bytes::Bytes;

/// `Content-Type` of every streamed body.
pub const CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Response headers a session writes before its first chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseHead {
    /// Value of the `Server` header.
    pub server: String,
    /// Value of the `Date` header, in IMF-fixdate form.
    pub date: String,
    /// Value of the `Content-Type` header.
    pub content_type: &'static str,
}

impl ResponseHead {
    /// Builds the head for a streamed response, dated now.
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            date: chrono::Utc::now()
                .format("%a, %d %b %Y %H:%M:%S GMT")
                .to_string(),
            content_type: CONTENT_TYPE,
        }
    }
}

/// The transport side of a streamed response.
///
/// A session calls [`write_head`](Self::write_head) once, then
/// [`flush`](Self::flush) for every chunk but the last, and finally
/// [`finish`](Self::finish) with the last chunk. At most one chunk is ever in
/// flight: the session waits for each returned future before producing the
/// next chunk.
pub trait ResponseSink: Send {
    /// Writes the response headers.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport can no longer accept the response.
    fn write_head(&mut self, head: ResponseHead) -> Result<()>;

    /// Hands a chunk to the transport. Resolves when the transport has
    /// acknowledged it.
    ///
    /// # Errors
    ///
    /// Returns an error if the chunk could not be delivered. Dropping the
    /// future before it resolves abandons the chunk.
    fn flush(&mut self, chunk: Bytes) -> impl Future<Output = Result<()>> + Send;

    /// Hands the final chunk to the transport and marks the body complete.
    /// Resolves when the transport has taken the final chunk.
    ///
    /// # Errors
    ///
    /// Returns an error if the final chunk could not be delivered.
    fn finish(&mut self, last: Bytes) -> impl Future<Output = Result<()>> + Send;
}
