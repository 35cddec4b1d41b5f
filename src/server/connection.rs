use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Notify;
use tokio::task::AbortHandle;
use tracing::debug;
use uuid::Uuid;

/// Handle to one accepted connection's echo worker.
///
/// The worker owns the connection itself for its whole lifetime; this handle
/// carries only the identity and the cooperative stop flag, so the registry
/// and the shutdown path can refer to the worker without touching its I/O.
#[derive(Debug, Clone)]
pub struct ConnectionHandler {
    /// Unique identifier for the handler.
    pub id: Uuid,
    /// Socket address of the peer.
    pub addr: SocketAddr,
    /// Cooperative stop flag. Set at most once, never cleared.
    stop: Arc<AtomicBool>,
    /// How long a read may block before the peer is probed.
    read_timeout: Duration,
}

impl ConnectionHandler {
    pub fn new(addr: SocketAddr, read_timeout: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            addr,
            stop: Arc::new(AtomicBool::new(false)),
            read_timeout,
        }
    }

    /// Requests a cooperative stop.
    ///
    /// Does not force-close the connection: the echo loop observes the flag
    /// at its next iteration boundary, and an in-flight blocking read is
    /// only interrupted by its own timeout. Reaction latency is therefore
    /// bounded by one read-timeout interval.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }
}

/// Registry entry: the handler handle plus, once the worker task has been
/// spawned, the handle used to force-terminate it.
struct RegisteredHandler {
    handler: ConnectionHandler,
    worker: Option<AbortHandle>,
}

/// Concurrent set of currently active connection handlers.
///
/// The accept loop inserts, each worker removes itself on every exit path,
/// and shutdown snapshot-iterates. The `draining` flag closes the race
/// between registration and a concurrent shutdown: a handler registered
/// into a draining registry is stopped on insert.
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: Arc<DashMap<Uuid, RegisteredHandler>>,
    draining: Arc<AtomicBool>,
    emptied: Arc<Notify>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(DashMap::new()),
            draining: Arc::new(AtomicBool::new(false)),
            emptied: Arc::new(Notify::new()),
        }
    }

    /// Adds a handler, before its worker is spawned so a concurrent
    /// shutdown enumeration always observes it.
    pub fn register(&self, handler: &ConnectionHandler) {
        self.handlers.insert(
            handler.id,
            RegisteredHandler {
                handler: handler.clone(),
                worker: None,
            },
        );
        if self.draining.load(Ordering::SeqCst) {
            handler.stop();
        }
    }

    /// Records the spawned worker task for a registered handler.
    ///
    /// A worker that already finished has removed its own entry; attaching
    /// to a missing entry is a no-op, and aborting a finished task is too.
    pub fn attach_worker(&self, id: &Uuid, worker: AbortHandle) {
        if let Some(mut entry) = self.handlers.get_mut(id) {
            entry.worker = Some(worker);
        }
    }

    /// Removes a handler. Called by the worker itself regardless of whether
    /// it finished normally or with an error.
    pub fn remove(&self, id: &Uuid) {
        if self.handlers.remove(id).is_some() {
            debug!("Removed handler {}", id);
        }
        if self.handlers.is_empty() {
            self.emptied.notify_waiters();
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Signals every currently registered handler to stop and marks the
    /// registry as draining, so handlers that race in afterwards are
    /// stopped on registration.
    pub fn stop_all(&self) {
        self.draining.store(true, Ordering::SeqCst);
        for entry in self.handlers.iter() {
            entry.handler.stop();
        }
    }

    /// Resolves once the registry is empty. The waiter is registered before
    /// emptiness is re-checked, so a removal racing with this call cannot
    /// be missed.
    pub async fn drained(&self) {
        loop {
            if self.handlers.is_empty() {
                return;
            }
            let emptied = self.emptied.notified();
            tokio::pin!(emptied);
            emptied.as_mut().enable();
            if self.handlers.is_empty() {
                return;
            }
            emptied.await;
        }
    }

    /// Force-terminates every worker still registered and clears the set.
    pub fn abort_all(&self) {
        for entry in self.handlers.iter() {
            debug!("Aborting handler {} for {}", entry.handler.id, entry.handler.addr);
            if let Some(worker) = &entry.worker {
                worker.abort();
            }
        }
        self.handlers.clear();
        self.emptied.notify_waiters();
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
