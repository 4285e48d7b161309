//! Configuration module for tokio_bridge.
//!
//! This module provides centralized configuration loading from environment variables.
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_bridge::config::Config;
//!
//! let config = Config::from_env()?;
//! println!("Listen address: {}", config.server.listen_addr);
//! ```

mod error;
mod logging;
mod parse;
mod server;
mod upload;

pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use parse::{parse_duration, parse_size};
pub use server::ServerConfig;
pub use upload::UploadConfig;

/// Complete application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Upload configuration.
    pub upload: UploadConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            upload: UploadConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::info;

        info!("Configuration loaded:");
        info!("  Listen: {}", self.server.listen_addr);
        if let Some(ref name) = self.server.server_name {
            info!("  Server name: {}", name);
        }
        info!("  Upload dir: {:?}", self.upload.dir);
        info!("  Upload max size: {} bytes", self.upload.max_size);
        info!("  Header timeout: {}s", self.server.header_timeout.as_secs());
        info!("  Drain timeout: {}s", self.server.drain_timeout.as_secs());
        info!(
            "  Access log: {}",
            if self.server.access_log { "enabled" } else { "disabled" }
        );
        info!("  Log: {:?} ({})", self.logging.format, self.logging.filter);
    }
}
