use thiserror::Error;

/// Represents the errors that can occur in the echo server.
#[derive(Error, Debug)]
pub enum EchoError {
    /// Represents an I/O failure on the listening socket or an individual
    /// connection.
    ///
    /// Read timeouts are not reported through this variant; the connection
    /// handler treats them as recoverable and answers with a keepalive probe.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Represents an error in the server configuration.
    ///
    /// This occurs when an invalid or inconsistent configuration is detected.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Indicates that the accept loop was started a second time.
    ///
    /// The listening socket is consumed by the first call to `start`, so a
    /// server instance can only run one accept loop.
    #[error("Server already started")]
    AlreadyStarted,
}
