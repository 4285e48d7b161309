//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;

use super::parse::{env_bool, env_duration, env_opt, env_parse};
use super::ConfigError;

/// Server configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address (default: 0.0.0.0:9501).
    pub listen_addr: SocketAddr,
    /// Value reported as `server_name` to handlers.
    pub server_name: Option<String>,
    /// Graceful shutdown drain timeout.
    pub drain_timeout: Duration,
    /// Maximum time to read request headers (slowloris protection).
    pub header_timeout: Duration,
    /// Emit one `access` log line per request (ACCESS_LOG=1).
    pub access_log: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: ([0, 0, 0, 0], 9501).into(),
            server_name: None,
            drain_timeout: Duration::from_secs(5),
            header_timeout: Duration::from_secs(5),
            access_log: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            listen_addr: env_parse("LISTEN_ADDR", defaults.listen_addr)?,
            server_name: env_opt("SERVER_NAME"),
            drain_timeout: env_duration("DRAIN_TIMEOUT", "5s")?
                .unwrap_or(defaults.drain_timeout),
            header_timeout: env_duration("HEADER_TIMEOUT", "5s")?
                .unwrap_or(defaults.header_timeout),
            access_log: env_bool("ACCESS_LOG", false),
        })
    }

    /// Use a specific listen address (e.g. `127.0.0.1:0` in tests).
    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }
}
