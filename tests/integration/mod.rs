//! Integration tests for tokio_bridge
//!
//! Every test starts an in-process server on an ephemeral port with its own
//! upload directory, so no external setup is needed.
//! Run with: cargo test --test integration

mod helpers;

mod http_basic;
mod params;
mod uploads;
