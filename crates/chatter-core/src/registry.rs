//! The live connection set.
//!
//! The registry is the single structure shared across all per-connection
//! tasks. One lock guards the whole map; every read is a consistent
//! point-in-time view, which the router relies on when snapshotting the
//! live set before a broadcast.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use chatter_protocol::Envelope;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// An opaque connection identifier.
pub type ConnectionId = String;

/// The fallible, non-blocking send half of a connection.
///
/// The connection's task owns the receiving half and writes whatever
/// arrives here to the transport.
pub type Outbox = mpsc::UnboundedSender<Arc<Envelope>>;

/// Atomic counter for ensuring unique IDs even within the same nanosecond.
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique connection ID.
#[must_use]
pub fn generate_connection_id() -> ConnectionId {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("conn_{}_{}", timestamp, counter)
}

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The handle was never registered or has already been removed.
    #[error("connection not found: {0}")]
    NotFound(ConnectionId),
}

/// A live connection: its outbox plus the display name bound to it, if any.
#[derive(Debug)]
struct Entry {
    outbox: Outbox,
    name: Option<String>,
}

/// The set of live connections.
///
/// Entries are created unnamed at transport accept, named once by the
/// registration handshake, and removed at transport close. Uniqueness of
/// the connection ID is required; display names may repeat.
#[derive(Debug, Default)]
pub struct Registry {
    entries: RwLock<HashMap<ConnectionId, Entry>>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ConnectionId, Entry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ConnectionId, Entry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a connection with no bound name.
    ///
    /// Idempotent: registering an ID that is already present leaves the
    /// existing entry untouched, including its bound name.
    pub fn register(&self, id: impl Into<ConnectionId>, outbox: Outbox) {
        let id = id.into();
        let mut entries = self.write();
        if entries.contains_key(&id) {
            debug!(connection = %id, "Already registered");
            return;
        }
        entries.insert(id.clone(), Entry { outbox, name: None });
        debug!(connection = %id, live = entries.len(), "Connection registered");
    }

    /// Bind a display name to a registered connection.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the connection was never
    /// registered or has already been removed; nothing is mutated in
    /// that case.
    pub fn bind_name(&self, id: &str, name: impl Into<String>) -> Result<(), RegistryError> {
        let mut entries = self.write();
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        let name = name.into();
        debug!(connection = %id, name = %name, "Name bound");
        entry.name = Some(name);
        Ok(())
    }

    /// Remove a connection, returning the name that was bound to it.
    ///
    /// Returns `None` both for unknown IDs and for connections that
    /// disconnected before completing registration; callers emit no LEAVE
    /// notification in either case.
    pub fn unbind(&self, id: &str) -> Option<String> {
        let mut entries = self.write();
        let entry = entries.remove(id)?;
        debug!(connection = %id, name = ?entry.name, live = entries.len(), "Connection removed");
        entry.name
    }

    /// The name currently bound to a connection, if any.
    #[must_use]
    pub fn bound_name(&self, id: &str) -> Option<String> {
        self.read().get(id).and_then(|e| e.name.clone())
    }

    /// Snapshot of the live connection IDs.
    #[must_use]
    pub fn live_handles(&self) -> Vec<ConnectionId> {
        self.read().keys().cloned().collect()
    }

    /// Snapshot of the live connections with their outboxes, for fan-out.
    #[must_use]
    pub fn outboxes(&self) -> Vec<(ConnectionId, Outbox)> {
        self.read()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.outbox.clone()))
            .collect()
    }

    /// Number of live connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check if no connections are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
