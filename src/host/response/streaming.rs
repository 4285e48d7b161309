//! Streaming response body.
//!
//! Body chunks written on a [`HostResponse`](super::HostResponse) travel
//! through an unbounded channel and are sent to the client as they arrive.
//! The response uses chunked transfer encoding unless the handler set
//! `Content-Length`.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body_util::StreamBody;
use hyper::body::Frame;
use hyper::ext::ReasonPhrase;
use hyper::Response;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;

use super::Head;

/// A chunk of streaming data.
#[derive(Debug, Clone)]
pub struct StreamChunk {
    /// The data bytes for this chunk.
    pub data: Bytes,
}

impl StreamChunk {
    /// Create a new stream chunk from bytes.
    #[inline]
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Check if this chunk is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Bytes> for StreamChunk {
    fn from(data: Bytes) -> Self {
        Self { data }
    }
}

/// Wrapper stream that converts `StreamChunk` to `Frame<Bytes>`.
pub struct ChunkFrameStream {
    inner: UnboundedReceiverStream<StreamChunk>,
}

impl ChunkFrameStream {
    /// Create a new chunk frame stream from a receiver.
    pub fn new(rx: mpsc::UnboundedReceiver<StreamChunk>) -> Self {
        Self {
            inner: UnboundedReceiverStream::new(rx),
        }
    }
}

impl Stream for ChunkFrameStream {
    type Item = Result<Frame<Bytes>, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                // Empty chunks would be read as end-of-body by chunked encoding.
                Poll::Ready(Some(chunk)) if chunk.is_empty() => continue,
                Poll::Ready(Some(chunk)) => return Poll::Ready(Some(Ok(Frame::data(chunk.data)))),
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Type alias for streaming body using our chunk stream.
pub type StreamingBody = StreamBody<ChunkFrameStream>;

/// Type alias for streaming HTTP response.
pub type StreamingResponse = Response<StreamingBody>;

/// Build the hyper response for a committed head and its body channel.
pub fn streaming_response(
    head: Head,
    body_rx: mpsc::UnboundedReceiver<StreamChunk>,
) -> StreamingResponse {
    let mut response = Response::new(StreamBody::new(ChunkFrameStream::new(body_rx)));
    *response.status_mut() = head.status;
    *response.headers_mut() = head.headers;

    if let Some(reason) = head.reason {
        match ReasonPhrase::try_from(reason.into_bytes()) {
            Ok(phrase) => {
                response.extensions_mut().insert(phrase);
            }
            Err(_) => tracing::debug!("dropping invalid reason phrase"),
        }
    }

    response
}
