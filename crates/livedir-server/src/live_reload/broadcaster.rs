//! Reload fan-out to connected browsers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use livedir_watch::ReloadSink;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Opaque identifier of a registered client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClientId(u64);

/// Receiving end of one client's single-slot delivery channel.
///
/// Yields `Some(())` once per pending reload and `None` after the client is
/// removed from its [`Broadcaster`].
#[derive(Debug)]
pub struct Client {
    id: ClientId,
    rx: mpsc::Receiver<()>,
}

impl Client {
    /// Identifier to pass to [`Broadcaster::remove`].
    #[must_use]
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Wait for the next reload signal.
    pub async fn recv(&mut self) -> Option<()> {
        self.rx.recv().await
    }

    /// Take a pending signal without waiting.
    pub fn try_recv(&mut self) -> Option<()> {
        self.rx.try_recv().ok()
    }

    pub(crate) fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<()>> {
        self.rx.poll_recv(cx)
    }
}

/// Set of connected reload clients.
///
/// Each client owns a channel with room for exactly one signal. `notify()`
/// never blocks: a client that has not consumed its previous signal simply
/// keeps that one, since one pending reload is as good as two.
///
/// A single mutex serializes `add`, `remove` and `notify`. It is never held
/// across an await point.
#[derive(Debug, Default)]
pub struct Broadcaster {
    clients: Mutex<HashMap<ClientId, mpsc::Sender<()>>>,
    next_id: AtomicU64,
}

impl Broadcaster {
    /// Create an empty broadcaster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new client.
    #[must_use]
    pub fn add(&self) -> Client {
        let (tx, rx) = mpsc::channel(1);
        let id = ClientId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let count = {
            let mut clients = self.lock();
            clients.insert(id, tx);
            clients.len()
        };
        tracing::debug!(client = id.0, clients = count, "Live reload client connected");

        Client { id, rx }
    }

    /// Deregister a client and close its channel.
    ///
    /// Removing an unknown or already removed id is a no-op.
    pub fn remove(&self, id: ClientId) {
        let removed = self.lock().remove(&id);
        if removed.is_some() {
            tracing::debug!(client = id.0, "Live reload client disconnected");
        }
    }

    /// Send a reload signal to every registered client.
    pub fn notify(&self) {
        let clients = self.lock();
        for (id, tx) in clients.iter() {
            match tx.try_send(()) {
                Ok(()) | Err(TrySendError::Full(())) => {}
                Err(TrySendError::Closed(())) => {
                    tracing::debug!(client = id.0, "Skipping closed live reload client");
                }
            }
        }
        if clients.is_empty() {
            tracing::debug!("Reload broadcast with no clients connected");
        } else {
            tracing::info!(clients = clients.len(), "Reload broadcast");
        }
    }

    /// Remove every client, ending all reload streams.
    pub fn disconnect_all(&self) {
        let drained = std::mem::take(&mut *self.lock());
        if !drained.is_empty() {
            tracing::debug!(clients = drained.len(), "Disconnecting live reload clients");
        }
    }

    /// Number of registered clients.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ClientId, mpsc::Sender<()>>> {
        // The map stays consistent even if a holder panicked.
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ReloadSink for Broadcaster {
    fn notify(&self) {
        Self::notify(self);
    }
}
