//! # chatter-server
//!
//! Axum HTTP + `WebSocket` message relay.
//!
//! - HTTP endpoints: `/ws` upgrade, `/health`, `/metrics`
//! - Per-connection handler: read loop, write loop, heartbeat watchdog
//! - Registry of active connections with broadcast fan-out to every peer
//! - Graceful shutdown via `tokio::signal` + `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;
