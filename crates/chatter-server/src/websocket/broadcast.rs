//! Best-effort fan-out of validated payloads to every registered peer.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use crate::metrics::WS_BROADCAST_DROPS_TOTAL;

use super::registry::ConnectionRegistry;

/// Lifetime drop budget before an unresponsive peer is evicted from the
/// registry. Its handler still owns the socket and tears it down on its
/// own (heartbeat expiry or peer close); eviction just stops queueing
/// payloads it will never drain.
const MAX_TOTAL_DROPS: u64 = 100;

/// Delivers payloads to the registry's current membership.
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl Broadcaster {
    /// Create a broadcaster over the given registry.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Send `payload` to every peer in the current snapshot.
    ///
    /// The payload is the original validated wire text, relayed verbatim.
    /// Delivery is best-effort per recipient: a full or closed write
    /// queue is logged and counted, and never prevents delivery to the
    /// remaining peers or surfaces as a failure of the publish itself.
    pub async fn publish(&self, payload: Arc<str>) {
        let peers = self.registry.snapshot().await;
        for peer in &peers {
            if peer.send(Arc::clone(&payload)) {
                continue;
            }
            counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
            let drops = peer.drop_count();
            if drops >= MAX_TOTAL_DROPS {
                warn!(conn_id = %peer.id, drops, "evicting unresponsive peer");
                self.registry.deregister(&peer.id).await;
            } else {
                warn!(conn_id = %peer.id, drops, "peer queue full, payload dropped");
            }
        }
        debug!(
            recipients = peers.len(),
            bytes = payload.len(),
            "published payload"
        );
    }
}
