//! Upload configuration.

use std::path::{Path, PathBuf};

use super::parse::{env_opt, env_size};
use super::ConfigError;

/// Default upload size limit (10 MB).
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 10 * 1024 * 1024;

/// Where multipart uploads are stored and how large they may be.
#[derive(Clone, Debug)]
pub struct UploadConfig {
    /// Directory for temporary upload files.
    pub dir: PathBuf,
    /// Files larger than this are recorded with an error code and not stored.
    pub max_size: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: std::env::temp_dir(),
            max_size: DEFAULT_MAX_UPLOAD_SIZE,
        }
    }
}

/// Make sure `dir` is a usable directory, creating it when missing.
fn prepare_dir(dir: &Path) -> Result<(), ConfigError> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::UploadDirCreate {
            path: dir.to_path_buf(),
            source,
        })
    } else if !dir.is_dir() {
        Err(ConfigError::UploadDirNotDirectory(dir.to_path_buf()))
    } else {
        Ok(())
    }
}

impl UploadConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let dir = env_opt("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);
        prepare_dir(&dir)?;

        Ok(Self {
            dir,
            max_size: env_size("UPLOAD_MAX_SIZE", "10m")?,
        })
    }

    /// Store uploads in a specific directory.
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    /// Override the size limit.
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }
}
