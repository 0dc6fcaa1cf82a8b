//! Per-peer connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;

/// One connected peer, as seen by the registry and the broadcaster.
///
/// The connection handler owns the socket itself; this struct is the
/// non-owning membership entry: an id, the sender side of the peer's
/// write queue, and liveness bookkeeping. All frames destined for the
/// peer (broadcasts and pings alike) funnel through the single write
/// queue so frame boundaries can never interleave.
pub struct PeerConnection {
    /// Unique connection ID (`conn_<uuidv7>`).
    pub id: String,
    /// Sender side of the connection's write queue.
    tx: mpsc::Sender<Arc<str>>,
    /// When this peer connected.
    pub connected_at: Instant,
    /// Whether a pong arrived since the last heartbeat check.
    pub is_alive: AtomicBool,
    /// When the last pong was received.
    last_pong: Mutex<Instant>,
    /// Count of payloads dropped because the write queue was full or closed.
    dropped: AtomicU64,
}

impl PeerConnection {
    /// Create a new peer entry around the given write queue.
    pub fn new(id: String, tx: mpsc::Sender<Arc<str>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue a payload for delivery to this peer.
    ///
    /// Never blocks: returns `false` (and counts a drop) if the queue is
    /// full or the peer's writer has gone away.
    pub fn send(&self, payload: Arc<str>) -> bool {
        if self.tx.try_send(payload).is_ok() {
            true
        } else {
            let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Total payloads dropped for this peer.
    pub fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Record a pong: the peer is alive and its deadline resets.
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Duration since the last pong (or since connecting).
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Check and reset the alive flag.
    ///
    /// Returns `true` if a pong arrived since the previous check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
