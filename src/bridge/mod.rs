//! Framework-facing request and response adapters.
//!
//! [`Request`] is a read-only view over a [`HostRequest`](crate::host::HostRequest)
//! and [`Response`] forwards everything to a live
//! [`HostResponse`](crate::host::HostResponse). Both are used through the
//! [`RequestInterface`] and [`ResponseInterface`] contracts.

pub mod file;
pub mod filter;
mod interface;
pub mod method;
pub mod negotiation;
mod request;
mod response;

pub use file::File;
pub use filter::{Filter, Sanitizer};
pub use interface::{RequestInterface, ResponseInterface};
pub use method::{is_valid_http_method, MethodSet};
pub use negotiation::QualityItem;
pub use request::{BasicAuth, Lookup, Request};
pub use response::Response;
