//! Per-connection request handling.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::header::{self, HeaderMap, HeaderValue};
use http::StatusCode;
use http_body_util::BodyExt;
use hyper::body::Incoming as IncomingBody;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, warn};

use super::Handler;
use crate::bridge::{Filter, Request, Response};
use crate::config::UploadConfig;
use crate::host::response::streaming_response;
use crate::host::{ConnectionInfo, Head, HostRequest, HostResponse, StreamChunk, StreamingResponse};

/// Check if an error is a common connection reset or timeout.
#[inline]
fn is_connection_error(err_str: &str) -> bool {
    err_str.contains("connection reset")
        || err_str.contains("broken pipe")
        || err_str.contains("Connection reset")
        || err_str.contains("os error 104")
        || err_str.contains("os error 32")
        || err_str.contains("timed out")
        || err_str.contains("deadline has elapsed")
        || err_str.contains("HeaderTimeout")
}

/// Small plain-text response built by the host itself.
fn plain_response(status: StatusCode, body: &'static str) -> StreamingResponse {
    let (tx, rx) = mpsc::unbounded_channel();
    let _ = tx.send(StreamChunk::new(body));

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );

    streaming_response(
        Head {
            status,
            reason: None,
            headers,
        },
        rx,
    )
}

/// Remove upload temp files the handler did not move away.
async fn remove_uploads(paths: Vec<PathBuf>) {
    for path in paths {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(path = %path.display(), "removed upload temp file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, path = %path.display(), "failed to remove upload temp file"),
        }
    }
}

/// Connection handler context, shared by every connection of one server.
pub struct ConnectionContext<H: Handler> {
    pub handler: Arc<H>,
    pub filter: Option<Arc<dyn Filter>>,
    pub upload: Arc<UploadConfig>,
    pub server_name: Option<Arc<str>>,
    /// Header read timeout (HEADER_TIMEOUT, default: 5s).
    pub header_timeout: Duration,
    /// Access logging enabled (ACCESS_LOG=1).
    pub access_log_enabled: bool,
    pub active_connections: Arc<AtomicUsize>,
}

impl<H: Handler> ConnectionContext<H> {
    /// Serve one TCP connection until it closes or shutdown is signalled.
    ///
    /// On shutdown the connection is asked to finish gracefully: in-flight
    /// requests complete, HTTP/1 keep-alive stops and HTTP/2 sends GOAWAY.
    pub async fn handle_connection(
        self: Arc<Self>,
        stream: TcpStream,
        remote_addr: SocketAddr,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);

        let local_addr = match stream.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                debug!("Failed to read local address: {:?}", e);
                self.active_connections.fetch_sub(1, Ordering::Relaxed);
                return;
            }
        };

        let conn_info = ConnectionInfo {
            remote_addr,
            local_addr,
            secure: false,
            server_name: self.server_name.clone(),
        };

        let ctx = Arc::clone(&self);
        let service = service_fn(move |req| {
            let ctx = Arc::clone(&ctx);
            let conn_info = conn_info.clone();
            async move { ctx.handle_request(req, conn_info).await }
        });

        let mut builder = auto::Builder::new(TokioExecutor::new());
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(Some(self.header_timeout))
            .keep_alive(true);
        builder.http2().max_concurrent_streams(250);

        let conn = builder.serve_connection(TokioIo::new(stream), service);
        tokio::pin!(conn);

        let result = tokio::select! {
            result = conn.as_mut() => result,
            _ = shutdown_rx.changed() => {
                conn.as_mut().graceful_shutdown();
                conn.await
            }
        };

        if let Err(err) = result {
            let err_str = format!("{:?}", err);
            if !is_connection_error(&err_str) {
                debug!("Connection error: {:?}", err);
            }
        }

        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    async fn handle_request(
        self: Arc<Self>,
        req: hyper::Request<IncomingBody>,
        conn_info: ConnectionInfo,
    ) -> Result<StreamingResponse, Infallible> {
        let request_start = Instant::now();
        let (parts, body) = req.into_parts();

        let method = parts.method.to_string();
        let path = parts.uri.path().to_string();

        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                debug!(error = %e, "failed to read request body");
                return Ok(plain_response(StatusCode::BAD_REQUEST, "Bad Request"));
            }
        };

        let host_request = match HostRequest::from_parts(parts, body, &conn_info, &self.upload).await {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "failed to parse request");
                return Ok(plain_response(StatusCode::BAD_REQUEST, "Bad Request"));
            }
        };

        let uploads = host_request.upload_paths();
        let mut request = Request::new(host_request);
        if let Some(ref filter) = self.filter {
            request = request.with_filter(Arc::clone(filter));
        }

        let (host_response, pending) = HostResponse::channel();
        let mut response = Response::new(host_response);

        let ctx = Arc::clone(&self);
        let remote_ip = conn_info.remote_addr.ip();
        tokio::spawn(async move {
            // A handler panic surfaces here as a JoinError. The host response
            // is dropped with the task, which closes the pending side.
            let handler = Arc::clone(&ctx.handler);
            let outcome = tokio::spawn(async move {
                handler.handle(request, &mut response).await;
                response
            })
            .await;

            let (status, bytes) = match outcome {
                Ok(mut response) => {
                    let host_response = response.host_mut();
                    host_response.end();
                    (host_response.status().as_u16(), host_response.bytes_written())
                }
                Err(e) => {
                    error!(error = %e, method = %method, path = %path, "request handler failed");
                    (StatusCode::INTERNAL_SERVER_ERROR.as_u16(), 0)
                }
            };

            remove_uploads(uploads).await;

            if ctx.access_log_enabled {
                tracing::info!(
                    target: "access",
                    ip = %remote_ip,
                    method = %method,
                    path = %path,
                    status = status,
                    bytes = bytes,
                    duration_ms = request_start.elapsed().as_secs_f64() * 1000.0,
                );
            }
        });

        match pending.into_response().await {
            Ok(response) => Ok(response),
            Err(e) => {
                error!(error = %e, "handler finished without a response");
                Ok(plain_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error",
                ))
            }
        }
    }
}
