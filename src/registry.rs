//! Connection registry
//!
//! The shared set of currently-active sessions. The registry is the only
//! state mutated from multiple tasks; everything else is owned by exactly
//! one task. Add and remove are atomic with respect to snapshots, and
//! `snapshot` hands the distributor an immutable point-in-time view so
//! fan-out never iterates the live map while sessions come and go.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::RelayError;
use crate::message::Delivery;
use crate::types::SessionId;

/// One registered session as seen by the distributor
///
/// Holds the identity, the display name captured at registration, and the
/// bounded outbound channel drained by that session's writer task. Cloning
/// a `Peer` clones the channel handle, not the connection.
#[derive(Debug, Clone)]
pub struct Peer {
    /// Unique identifier for this session
    pub id: SessionId,
    /// Display name, immutable once registered
    pub name: String,
    /// Registry → writer-task delivery channel
    outbound: mpsc::Sender<Delivery>,
}

impl Peer {
    /// Create a peer backed by the given delivery channel
    pub fn new(id: SessionId, name: String, outbound: mpsc::Sender<Delivery>) -> Self {
        Self { id, name, outbound }
    }

    /// Hand a delivery to this peer's writer task without waiting.
    ///
    /// Fails when the writer task is gone (disconnect) or its buffer is
    /// full (the peer is not draining). Either way the caller treats it
    /// as a failed send.
    pub fn try_deliver(
        &self,
        delivery: Delivery,
    ) -> Result<(), mpsc::error::TrySendError<Delivery>> {
        self.outbound.try_send(delivery)
    }
}

/// The authoritative set of active sessions
///
/// Cheaply clonable handle over a shared map. No await point ever occurs
/// while the lock is held; every operation is a short critical section.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    inner: Arc<RwLock<HashMap<SessionId, Peer>>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session.
    ///
    /// Fails with `DuplicateSession` if the id is already present; with
    /// UUID v4 ids this indicates a caller bug, and the failure is fatal
    /// to this add only.
    pub fn add(&self, peer: Peer) -> Result<(), RelayError> {
        let mut map = self.write_lock();
        if map.contains_key(&peer.id) {
            return Err(RelayError::DuplicateSession(peer.id));
        }
        debug!("session {} ('{}') registered", peer.id, peer.name);
        map.insert(peer.id, peer);
        Ok(())
    }

    /// Remove a session if present.
    ///
    /// Idempotent: removing an absent id is a no-op, so the session's own
    /// closing path and any forced-eviction path can race safely.
    pub fn remove(&self, id: SessionId) -> Option<Peer> {
        let removed = self.write_lock().remove(&id);
        if removed.is_some() {
            debug!("session {} deregistered", id);
        }
        removed
    }

    /// Point-in-time view of all registered sessions.
    ///
    /// Safe to iterate while adds and removes proceed on the live map;
    /// this is what lets fan-out run without holding any lock across
    /// per-connection sends.
    pub fn snapshot(&self) -> Vec<Peer> {
        self.read_lock().values().cloned().collect()
    }

    /// Number of registered sessions
    pub fn len(&self) -> usize {
        self.read_lock().len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.read_lock().is_empty()
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, HashMap<SessionId, Peer>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<SessionId, Peer>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}
