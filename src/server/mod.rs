//! Host HTTP server.
//!
//! Accepts TCP connections, serves them with hyper (HTTP/1.1 and HTTP/2 with
//! automatic detection), turns each request into a [`Request`]/[`Response`]
//! adapter pair and hands both to a [`Handler`]. The response is ended by the
//! server once the handler returns.
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_bridge::bridge::{Request, Response, ResponseInterface};
//! use tokio_bridge::config::{ServerConfig, UploadConfig};
//! use tokio_bridge::server::{Handler, Server};
//!
//! struct Hello;
//!
//! #[async_trait::async_trait]
//! impl Handler for Hello {
//!     async fn handle(&self, _request: Request, response: &mut Response) {
//!         response.set_content("Hello World");
//!     }
//! }
//!
//! let server = Server::new(ServerConfig::default(), UploadConfig::default(), Hello);
//! server.run().await?;
//! ```
//!
//! # Graceful Shutdown
//!
//! [`Server::trigger_shutdown`] stops the accept loop and asks every open
//! connection to finish its in-flight requests; [`Server::wait_for_drain`]
//! waits for them with a timeout.

pub mod connection;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::bridge::{Filter, Request, Response};
use crate::config::{ServerConfig, UploadConfig};
use connection::ConnectionContext;

/// Application entry point for one request.
///
/// The response is open when `handle` is called; status, headers and content
/// set on it go to the client as they are written.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, request: Request, response: &mut Response);
}

/// HTTP server running a [`Handler`].
pub struct Server<H: Handler> {
    config: ServerConfig,
    upload: Arc<UploadConfig>,
    handler: Arc<H>,
    filter: Option<Arc<dyn Filter>>,
    /// Active connections counter
    active_connections: Arc<AtomicUsize>,
    /// Shutdown signal sender
    shutdown_tx: watch::Sender<bool>,
    /// Shutdown signal receiver (cloneable)
    shutdown_rx: watch::Receiver<bool>,
    /// Shutdown initiated flag
    shutdown_initiated: AtomicBool,
}

impl<H: Handler> Server<H> {
    pub fn new(config: ServerConfig, upload: UploadConfig, handler: H) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            config,
            upload: Arc::new(upload),
            handler: Arc::new(handler),
            filter: None,
            active_connections: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
            shutdown_rx,
            shutdown_initiated: AtomicBool::new(false),
        }
    }

    /// Filter handed to every request adapter.
    pub fn with_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Bind the configured listen address.
    pub async fn bind(&self) -> std::io::Result<TcpListener> {
        TcpListener::bind(self.config.listen_addr).await
    }

    /// Bind and serve until shutdown is triggered.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener until shutdown.
    pub async fn serve(
        &self,
        listener: TcpListener,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let local_addr: SocketAddr = listener.local_addr()?;
        info!("Server listening on http://{}", local_addr);

        let ctx = Arc::new(ConnectionContext {
            handler: Arc::clone(&self.handler),
            filter: self.filter.clone(),
            upload: Arc::clone(&self.upload),
            server_name: self.config.server_name.as_deref().map(Arc::from),
            header_timeout: self.config.header_timeout,
            access_log_enabled: self.config.access_log,
            active_connections: Arc::clone(&self.active_connections),
        });

        let mut shutdown_rx = self.shutdown_rx.clone();
        if *shutdown_rx.borrow_and_update() {
            return Ok(());
        }

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, remote_addr) = match result {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!("Accept error: {}", e);
                            continue;
                        }
                    };

                    let _ = stream.set_nodelay(true);

                    let ctx = Arc::clone(&ctx);
                    let conn_shutdown = self.shutdown_rx.clone();
                    tokio::spawn(async move {
                        ctx.handle_connection(stream, remote_addr, conn_shutdown).await;
                    });
                }
                _ = shutdown_rx.changed() => {
                    debug!("Received shutdown signal, stopping accept loop");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Trigger graceful shutdown.
    /// Stops the accept loop and tells open connections to finish.
    pub fn trigger_shutdown(&self) {
        if self.shutdown_initiated.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(true);
    }

    /// Get the configured drain timeout.
    pub fn drain_timeout(&self) -> Duration {
        self.config.drain_timeout
    }

    /// Get current active connections count.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Wait for all active connections to drain.
    /// Returns true if drained successfully, false if timeout was reached.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let start = std::time::Instant::now();
        let check_interval = Duration::from_millis(50);

        loop {
            let active = self.active_connections.load(Ordering::Relaxed);
            if active == 0 {
                return true;
            }

            if start.elapsed() >= timeout {
                warn!("Drain timeout reached with {} active connections", active);
                return false;
            }

            debug!("Waiting for {} connections to drain...", active);
            tokio::time::sleep(check_interval).await;
        }
    }
}
