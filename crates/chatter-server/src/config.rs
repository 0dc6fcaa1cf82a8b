//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the relay server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections; upgrades beyond this are
    /// refused before a connection is created.
    pub max_connections: usize,
    /// Interval between outbound liveness pings, in seconds. Must be
    /// strictly shorter than `heartbeat_timeout_secs` so a healthy peer's
    /// pongs keep resetting the deadline before it expires.
    pub heartbeat_interval_secs: u64,
    /// Window in seconds without a pong before a peer is considered dead.
    pub heartbeat_timeout_secs: u64,
    /// Deadline for a single outbound frame write, in seconds.
    pub write_timeout_secs: u64,
    /// Max inbound WebSocket message size in bytes. Oversized frames are
    /// rejected by the transport before any payload validation runs.
    pub max_message_size: usize,
    /// Depth of each connection's outbound send queue.
    pub send_queue_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 256,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            write_timeout_secs: 10,
            max_message_size: 512,
            send_queue_size: 256,
        }
    }
}

impl ServerConfig {
    /// Ping interval as a `Duration`.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Pong deadline window as a `Duration`.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    /// Per-frame write deadline as a `Duration`.
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}
