pub mod connection;
pub mod handler;
pub mod shutdown;

// Re-export public components
pub use connection::{ConnectionHandler, HandlerRegistry};
pub use handler::KEEPALIVE_PROBE;
pub use shutdown::ShutdownSignal;

use std::net::SocketAddr;
use std::sync::Mutex;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::utils::error::EchoError;

/// Line-oriented TCP echo server.
///
/// Owns the listening socket, the registry of active connection handlers,
/// and the shutdown signal. [`Server::start`] runs the accept loop;
/// [`Server::shutdown`] may be called from any other task, concurrently
/// with `start`.
pub struct Server {
    config: ServerConfig,
    /// Taken exactly once by `start`; the accept loop is the sole consumer
    /// of new connections.
    listener: Mutex<Option<TcpListener>>,
    local_addr: SocketAddr,
    registry: HandlerRegistry,
    shutdown: ShutdownSignal,
}

impl Server {
    /// Binds the listening socket described by the configuration.
    ///
    /// # Errors
    /// Returns `EchoError::Io` if the socket cannot be bound.
    pub async fn bind(config: ServerConfig) -> Result<Self, EchoError> {
        let listener = TcpListener::bind(config.listen_addr()).await?;
        let local_addr = listener.local_addr()?;
        info!("Echo server listening on {}", local_addr);

        Ok(Self {
            config,
            listener: Mutex::new(Some(listener)),
            local_addr,
            registry: HandlerRegistry::new(),
            shutdown: ShutdownSignal::new(),
        })
    }

    /// The address actually bound. With port 0 in the configuration this is
    /// where the OS-assigned ephemeral port shows up.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of currently active connection handlers.
    pub fn active_connections(&self) -> usize {
        self.registry.len()
    }

    /// Accepts connections until shutdown is requested.
    ///
    /// A failed accept is logged and the loop continues; only the shutdown
    /// signal ends the loop, silently. The listening socket is dropped, and
    /// with it closed, when the loop exits.
    ///
    /// # Errors
    /// Returns `EchoError::AlreadyStarted` if the accept loop was already
    /// started on this instance.
    pub async fn start(&self) -> Result<(), EchoError> {
        let listener = self
            .listener
            .lock()
            .unwrap()
            .take()
            .ok_or(EchoError::AlreadyStarted)?;

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.dispatch(stream, addr),
                        Err(e) => {
                            // A single bad accept must not take the loop down.
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = self.shutdown.triggered() => {
                    debug!("Shutdown signalled, accept loop ending");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Registers a handler for an accepted connection and spawns its worker.
    fn dispatch(&self, stream: TcpStream, addr: SocketAddr) {
        info!("Handling incoming connection from {}", addr);

        let conn = ConnectionHandler::new(addr, self.config.read_timeout());
        // Registered before the worker is spawned so a concurrent shutdown
        // enumeration observes it; a draining registry stops it on insert.
        self.registry.register(&conn);

        let registry = self.registry.clone();
        let worker = conn.clone();
        // Dispatch is unbounded: a burst of connections grows the task set
        // rather than stalling the accept loop. Accepted resource-policy
        // tradeoff under sustained load.
        let join = tokio::spawn(async move {
            let result = handler::run(&worker, stream).await;
            // The entry leaves the registry on every exit path.
            registry.remove(&worker.id);
            match result {
                Ok(()) => info!("Closing connection to {}", worker.addr),
                Err(e) => error!("Connection error for {}: {}", worker.addr, e),
            }
        });
        self.registry.attach_worker(&conn.id, join.abort_handle());
    }

    /// Coordinated graceful shutdown.
    ///
    /// Stops accepting new connections, signals every active handler to
    /// stop, waits up to the configured grace period for them to drain, and
    /// force-terminates whatever is left after the deadline. Always returns
    /// within the grace period plus scheduling slack, even if a handler is
    /// stuck.
    pub async fn shutdown(&self) {
        info!("Shutting down gracefully");

        // Stop pulling new connections; the accept loop drops the listening
        // socket when it observes the signal.
        self.shutdown.trigger();

        // Ask every live handler to stop. Handlers blocked in a read react
        // within one read-timeout interval.
        self.registry.stop_all();

        let grace = self.config.shutdown_grace();
        if tokio::time::timeout(grace, self.registry.drained())
            .await
            .is_err()
        {
            warn!(
                "Shutdown grace elapsed, aborting {} outstanding handler(s)",
                self.registry.len()
            );
            self.registry.abort_all();
        }

        info!("Shutdown complete");
    }
}
