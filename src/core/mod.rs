//! Core types shared by the host layer and the adapters.
//!
//! - [`Error`] - error taxonomy for adapters and host primitives
//! - [`Result`] - result alias

mod error;

pub use error::{Error, Result};
