//! # Line-oriented TCP echo server
//!
//! Binary entry point: loads configuration, initializes logging, and runs
//! the echo server with graceful shutdown.
//!
//! ## Features
//! - Newline-delimited echo over plain TCP
//! - Keepalive probing of idle connections
//! - Graceful shutdown via Ctrl+C or typing `q` on the console
//! - Environment-based configuration loading
//!
//! ## Dependencies
//! - `tokio` for asynchronous runtime
//! - `dotenv` for environment configuration
//! - `tracing` for logging

use echo_rs::{config::ServerConfig, server::Server};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::info;

/// Entry point for the echo server application.
///
/// Initializes logging, loads configuration from the environment,
/// binds the listening socket, and runs the accept loop until a shutdown
/// is requested.
///
/// # Errors
/// Returns an error if configuration validation fails or if the server
/// fails to bind to its port.
#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let _ = dotenv::dotenv();
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env()?;
    config.validate()?;

    let server = Server::bind(config).await?;

    // Run the accept loop until either watcher requests shutdown. Both
    // watchers funnel into the same Server::shutdown, which drains active
    // connections within the configured grace period.
    tokio::select! {
        res = server.start() => res?,
        _ = shutdown_signal() => {
            server.shutdown().await;
        }
        _ = console_watcher() => {
            server.shutdown().await;
        }
    }

    Ok(())
}

/// Listens for a shutdown signal (Ctrl+C).
///
/// This function blocks until the signal is received, allowing the server
/// to perform cleanup before exiting.
async fn shutdown_signal() {
    signal::ctrl_c().await.expect("Failed to listen for shutdown signal");
}

/// Watches the console for a quit command.
///
/// Resolves when a line containing `q` (case-insensitive) is read from
/// standard input. When stdin closes without a quit command, as in
/// non-interactive runs, this pends forever so the server keeps running.
async fn console_watcher() {
    info!("Type Q to exit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().eq_ignore_ascii_case("q") {
            return;
        }
    }
    std::future::pending::<()>().await;
}
