//! Live response handle owned by the host.
//!
//! A [`HostResponse`] is open from the moment the request arrives. The status
//! line and headers are committed on the first body write (or on `end`), body
//! bytes go to the client immediately, and only the host ends the response.

mod streaming;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use hyper::ext::ReasonPhrase;
use tokio::sync::{mpsc, oneshot};

use crate::core::{Error, Result};

pub use streaming::{
    streaming_response, ChunkFrameStream, StreamChunk, StreamingBody, StreamingResponse,
};

/// Status line and headers as sent to the client.
#[derive(Debug, Clone)]
pub struct Head {
    pub status: StatusCode,
    pub reason: Option<String>,
    pub headers: HeaderMap,
}

/// Writable side of an in-flight response.
#[derive(Debug)]
pub struct HostResponse {
    status: StatusCode,
    reason: Option<String>,
    headers: HeaderMap,
    head_tx: Option<oneshot::Sender<Head>>,
    body_tx: Option<mpsc::UnboundedSender<StreamChunk>>,
    bytes_written: u64,
}

/// Connection side of an in-flight response.
#[derive(Debug)]
pub struct PendingResponse {
    head_rx: oneshot::Receiver<Head>,
    body_rx: mpsc::UnboundedReceiver<StreamChunk>,
}

impl PendingResponse {
    /// Wait for the head and build the streaming hyper response.
    ///
    /// Fails with [`Error::ConnectionClosed`] when the response handle was
    /// dropped without committing a head.
    pub async fn into_response(self) -> Result<StreamingResponse> {
        let head = self.head_rx.await.map_err(|_| Error::ConnectionClosed)?;
        Ok(streaming_response(head, self.body_rx))
    }

    /// Raw channel ends.
    pub fn into_parts(
        self,
    ) -> (
        oneshot::Receiver<Head>,
        mpsc::UnboundedReceiver<StreamChunk>,
    ) {
        (self.head_rx, self.body_rx)
    }
}

impl HostResponse {
    /// Create a response handle and the connection side it writes to.
    pub fn channel() -> (HostResponse, PendingResponse) {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::unbounded_channel();

        let response = HostResponse {
            status: StatusCode::OK,
            reason: None,
            headers: HeaderMap::new(),
            head_tx: Some(head_tx),
            body_tx: Some(body_tx),
            bytes_written: 0,
        };

        (response, PendingResponse { head_rx, body_rx })
    }

    /// Current status code.
    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Current headers.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Whether the status line and headers went out.
    #[inline]
    pub fn is_committed(&self) -> bool {
        self.head_tx.is_none()
    }

    /// Whether the host ended the response.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.body_tx.is_none()
    }

    /// Body bytes written so far.
    #[inline]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Set the status line. An empty reason uses the canonical phrase.
    pub fn set_status_code(&mut self, code: u16, reason: &str) -> Result<()> {
        if self.is_committed() {
            return Err(Error::HeadersSent);
        }

        let status = StatusCode::from_u16(code)
            .map_err(|_| Error::InvalidResponse(format!("invalid status code: {}", code)))?;

        let reason = if reason.is_empty() {
            None
        } else {
            ReasonPhrase::try_from(reason.as_bytes().to_vec()).map_err(|_| {
                Error::InvalidResponse(format!("invalid reason phrase: {:?}", reason))
            })?;
            Some(reason.to_string())
        };

        self.status = status;
        self.reason = reason;
        Ok(())
    }

    /// Set a header, replacing any previous value.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        if self.is_committed() {
            return Err(Error::HeadersSent);
        }

        let name = HeaderName::try_from(name)
            .map_err(|_| Error::InvalidResponse(format!("invalid header name: {:?}", name)))?;
        let value = HeaderValue::try_from(value)
            .map_err(|_| Error::InvalidResponse(format!("invalid header value for {}", name)))?;

        self.headers.insert(name, value);
        Ok(())
    }

    /// Remove a header.
    pub fn remove_header(&mut self, name: &str) -> Result<()> {
        if self.is_committed() {
            return Err(Error::HeadersSent);
        }
        self.headers.remove(name);
        Ok(())
    }

    /// Send a body chunk to the client, committing the head first if needed.
    pub fn write(&mut self, data: impl Into<Bytes>) -> Result<()> {
        let data = data.into();
        self.commit()?;

        let body_tx = self.body_tx.as_ref().ok_or(Error::ConnectionClosed)?;
        if data.is_empty() {
            return Ok(());
        }

        let len = data.len() as u64;
        body_tx
            .send(StreamChunk::new(data))
            .map_err(|_| Error::ConnectionClosed)?;
        self.bytes_written += len;
        Ok(())
    }

    /// Finish the response. Idempotent.
    pub fn end(&mut self) {
        if let Err(e) = self.commit() {
            tracing::debug!(error = %e, "response head not delivered");
        }
        self.body_tx = None;
    }

    fn commit(&mut self) -> Result<()> {
        let Some(head_tx) = self.head_tx.take() else {
            return Ok(());
        };

        let head = Head {
            status: self.status,
            reason: self.reason.clone(),
            headers: self.headers.clone(),
        };
        head_tx.send(head).map_err(|_| Error::ConnectionClosed)
    }
}
