//! WebSocket connection lifecycle, heartbeat liveness, and broadcasting.
//!
//! `handler` owns each connection's read/write loops and drives the rest:
//! inbound text goes through `chatter_core` validation, then `broadcast`
//! fans the raw payload out to every peer in the `registry`.

pub mod broadcast;
pub mod connection;
pub mod handler;
pub mod heartbeat;
pub mod registry;
