//! Core error types.

use std::fmt;

/// Errors raised by the host layer and the request/response adapters.
///
/// Missing parameters, headers and server values are never errors; lookups
/// fall back to a default or an empty value instead.
#[derive(Debug)]
pub enum Error {
    /// A method name passed to a strict method check is not a known HTTP verb.
    InvalidMethod(String),

    /// Sanitizing filters were requested but no filter is wired into the request.
    FilterUnavailable,

    /// The filter does not know the requested rule.
    UnknownFilter(String),

    /// Status line or headers changed after the response head went out.
    HeadersSent,

    /// The client side of the response body channel is gone.
    ConnectionClosed,

    /// Invalid HTTP request.
    InvalidRequest(String),

    /// Invalid HTTP response (bad status code, header name or value).
    InvalidResponse(String),

    /// Malformed multipart body.
    Multipart(String),

    /// I/O error.
    Io(std::io::Error),

    /// HTTP error.
    Http(http::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidMethod(method) => write!(f, "invalid HTTP method: {}", method),
            Error::FilterUnavailable => {
                write!(f, "a filter is required to sanitize request values")
            }
            Error::UnknownFilter(rule) => write!(f, "unknown filter rule: {}", rule),
            Error::HeadersSent => write!(f, "response headers already sent"),
            Error::ConnectionClosed => write!(f, "connection closed"),
            Error::InvalidRequest(msg) => write!(f, "invalid request: {}", msg),
            Error::InvalidResponse(msg) => write!(f, "invalid response: {}", msg),
            Error::Multipart(msg) => write!(f, "multipart error: {}", msg),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Http(e) => write!(f, "HTTP error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<http::Error> for Error {
    fn from(e: http::Error) -> Self {
        Error::Http(e)
    }
}

impl From<multer::Error> for Error {
    fn from(e: multer::Error) -> Self {
        Error::Multipart(e.to_string())
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
