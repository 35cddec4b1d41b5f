use std::time::Duration;

use config::Config;
use serde::Deserialize;

use crate::utils::error::EchoError;

/// Configuration settings for the echo server.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// The address the server will bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// The port on which the server will listen. Port 0 lets the OS assign
    /// an ephemeral port, which tests and benchmarks rely on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// How long a connection may stay silent before the server probes it
    /// with a keepalive line, in seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// How long a graceful shutdown waits for in-flight connections to
    /// drain before force-terminating them, in seconds.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    // The historical echo service port.
    7
}

fn default_read_timeout() -> u64 {
    5
}

fn default_shutdown_grace() -> u64 {
    10
}

impl ServerConfig {
    /// Loads the server configuration from environment variables.
    ///
    /// Environment variables should be prefixed with `ECHO_`; every field
    /// has a default, so an empty environment is valid.
    ///
    /// # Errors
    /// Returns an `EchoError::ConfigurationError` if the configuration cannot be loaded.
    pub fn from_env() -> Result<Self, EchoError> {
        Config::builder()
            .add_source(config::Environment::with_prefix("ECHO"))
            .build()
            .map_err(|e| EchoError::ConfigurationError(e.to_string()))?
            .try_deserialize()
            .map_err(|e| EchoError::ConfigurationError(e.to_string()))
    }

    /// Validates the configuration settings.
    ///
    /// # Errors
    /// Returns an `EchoError::ConfigurationError` if validation fails.
    pub fn validate(&self) -> Result<(), EchoError> {
        if self.read_timeout_secs == 0 {
            return Err(EchoError::ConfigurationError(
                "read_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.shutdown_grace_secs == 0 {
            return Err(EchoError::ConfigurationError(
                "shutdown_grace_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// The `host:port` string the listening socket binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Per-connection read timeout.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// Bounded wait applied during graceful shutdown.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}
