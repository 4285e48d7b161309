//! Configuration error types.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Why the bridge configuration could not be loaded.
#[derive(Debug)]
pub enum ConfigError {
    /// An environment variable holds a value of the wrong shape.
    BadValue {
        key: String,
        value: String,
        reason: String,
    },
    /// LOG_FORMAT is neither `json` nor `text`.
    UnknownLogFormat(String),
    /// UPLOAD_DIR points at something that is not a directory.
    UploadDirNotDirectory(PathBuf),
    /// UPLOAD_DIR is missing and could not be created.
    UploadDirCreate { path: PathBuf, source: io::Error },
}

impl ConfigError {
    /// Environment variable the error is about.
    pub fn env_key(&self) -> &str {
        match self {
            ConfigError::BadValue { key, .. } => key,
            ConfigError::UnknownLogFormat(_) => "LOG_FORMAT",
            ConfigError::UploadDirNotDirectory(_) | ConfigError::UploadDirCreate { .. } => "UPLOAD_DIR",
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::BadValue { key, value, reason } => {
                write!(f, "{}='{}' rejected: {}", key, value, reason)
            }
            ConfigError::UnknownLogFormat(format) => {
                write!(f, "LOG_FORMAT must be json or text, got '{}'", format)
            }
            ConfigError::UploadDirNotDirectory(path) => {
                write!(f, "UPLOAD_DIR {} is not a directory", path.display())
            }
            ConfigError::UploadDirCreate { path, source } => {
                write!(f, "cannot create UPLOAD_DIR {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::UploadDirCreate { source, .. } => Some(source),
            _ => None,
        }
    }
}
