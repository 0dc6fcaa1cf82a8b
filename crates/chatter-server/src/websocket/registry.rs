//! The process-wide set of active connections.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::RwLock;

use super::connection::PeerConnection;

/// Active connection set, keyed by connection ID.
///
/// This is the one piece of shared mutable state in the relay. Membership
/// exactly brackets a handler's lifetime: a peer is inserted when its
/// handler starts and removed when the handler exits, and every mutation
/// is serialized behind the lock so handlers never coordinate directly.
pub struct ConnectionRegistry {
    peers: RwLock<HashMap<String, Arc<PeerConnection>>>,
    /// Atomic counter so health/metrics reads never take the lock.
    active: AtomicUsize,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
            active: AtomicUsize::new(0),
        }
    }

    /// Add a peer to the active set.
    pub async fn register(&self, peer: Arc<PeerConnection>) {
        let mut peers = self.peers.write().await;
        if peers.insert(peer.id.clone(), peer).is_none() {
            let _ = self.active.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Remove a peer from the active set.
    ///
    /// Removing an absent ID is a no-op, which makes the shutdown-race
    /// double-deregister (broadcast eviction vs. handler teardown) safe.
    pub async fn deregister(&self, id: &str) {
        let mut peers = self.peers.write().await;
        if peers.remove(id).is_some() {
            let _ = self.active.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Point-in-time copy of the active set.
    ///
    /// Membership may change the instant the lock is released; callers
    /// must treat delivery to a since-removed peer as a soft failure.
    pub async fn snapshot(&self) -> Vec<Arc<PeerConnection>> {
        self.peers.read().await.values().cloned().collect()
    }

    /// Number of active connections.
    pub fn count(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
