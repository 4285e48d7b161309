//! tokio_bridge - framework request/response adapters over an async hyper host.
//!
//! The host server owns the socket, parses every request once and keeps the
//! response open while application code runs. The adapters in [`bridge`]
//! present those host objects through the request and response contracts a
//! framework layer expects:
//!
//! - [`bridge::Request`] is a read-only view: combined query/body/cookie
//!   parameters, headers, server metadata, uploaded files, content
//!   negotiation and authentication helpers.
//! - [`bridge::Response`] forwards status, headers and body writes to the
//!   connection as soon as they are made.
//!
//! # Architecture
//!
//! ```text
//!  TCP ──► server::Server ──► host::HostRequest ──► bridge::Request  ─┐
//!                 │                                                   ├─► Handler
//!                 └─────────► host::HostResponse ─► bridge::Response ─┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_bridge::bridge::{Request, RequestInterface, Response, ResponseInterface};
//! use tokio_bridge::server::{Handler, Server};
//! use tokio_bridge::Config;
//!
//! struct App;
//!
//! #[async_trait::async_trait]
//! impl Handler for App {
//!     async fn handle(&self, request: Request, response: &mut Response) {
//!         let name = request.get("name").and_then(|v| v.as_str()).unwrap_or("World");
//!         response.set_content(format!("Hello {}", name));
//!     }
//! }
//!
//! let config = Config::from_env()?;
//! Server::new(config.server, config.upload, App).run().await?;
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit hash (8 chars) with optional "-dirty" suffix
pub const BUILD_VERSION: &str = env!("BUILD_VERSION");

/// Full version string: "0.1.0 (abc12345)" or "0.1.0 (abc12345-dirty)"
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_VERSION"), ")");

pub mod bridge;
pub mod config;
pub mod core;
pub mod host;
pub mod logging;
pub mod server;
pub mod types;

// Re-exports for convenience
pub use bridge::{Request, RequestInterface, Response, ResponseInterface};
pub use config::Config;
pub use server::{Handler, Server};
