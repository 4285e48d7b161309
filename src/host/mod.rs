//! Host server primitives.
//!
//! The host owns the socket, parses raw HTTP into a [`HostRequest`] and
//! finalizes every [`HostResponse`]. The adapters in [`crate::bridge`] only
//! read from the former and write to the latter.

pub mod request;
pub mod response;

pub use request::{server_keys, ConnectionInfo, HostRequest, HostRequestBuilder};
pub use response::{Head, HostResponse, PendingResponse, StreamChunk, StreamingResponse};
