//! Per-connection lifecycle: the read loop, write loop, and teardown.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message as WsMessage, Utf8Bytes, WebSocket};
use chatter_core::Message;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::metrics::{
    RELAY_HEARTBEAT_EXPIRIES_TOTAL, RELAY_MESSAGES_TOTAL, RELAY_REJECTED_TOTAL,
    WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL,
};
use crate::server::AppState;

use super::connection::PeerConnection;
use super::heartbeat::{HeartbeatResult, run_heartbeat};

/// Drive one upgraded connection from registration to teardown.
///
/// The handler owns the socket for its whole run. It registers the peer,
/// spawns the write loop (queued payloads + periodic pings) and the
/// heartbeat watchdog, then processes inbound frames in arrival order
/// until the peer goes away: close frame, read error, missed heartbeat
/// deadline, write failure, or server shutdown. Whatever the exit path,
/// teardown runs the same sequence: deregister, best-effort close frame,
/// release the socket.
pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let (tx, queue) = mpsc::channel(state.config.send_queue_size);
    let peer = Arc::new(PeerConnection::new(format!("conn_{}", Uuid::now_v7()), tx));

    state.registry.register(Arc::clone(&peer)).await;
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
    info!(conn_id = %peer.id, "peer connected");

    let (ws_tx, mut ws_rx) = socket.split();

    // One token ties the connection's tasks together. It is a child of
    // the server token, so a server shutdown drains every connection.
    let cancel = state.shutdown.token().child_token();

    let writer = tokio::spawn(write_loop(
        ws_tx,
        queue,
        state.config.heartbeat_interval(),
        state.config.write_timeout(),
        cancel.clone(),
    ));

    let mut watchdog = tokio::spawn(run_heartbeat(
        Arc::clone(&peer),
        state.config.heartbeat_interval(),
        state.config.heartbeat_timeout(),
        cancel.clone(),
    ));

    // Steady state: frames are handled strictly in arrival order, with no
    // concurrency inside this loop.
    loop {
        tokio::select! {
            frame = ws_rx.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => match Message::parse(&text) {
                    Ok(message) => {
                        debug!(conn_id = %peer.id, handle = %message.handle, "relaying message");
                        counter!(RELAY_MESSAGES_TOTAL).increment(1);
                        // Relay the original bytes, never a re-serialization.
                        state.broadcaster.publish(Arc::from(&*text)).await;
                    }
                    Err(e) => {
                        counter!(RELAY_REJECTED_TOTAL).increment(1);
                        warn!(conn_id = %peer.id, error = %e, "dropping invalid payload");
                    }
                },
                Some(Ok(WsMessage::Pong(_))) => peer.mark_alive(),
                Some(Ok(WsMessage::Ping(_))) => {
                    // axum answers pings itself
                    debug!(conn_id = %peer.id, "ping received");
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    info!(conn_id = %peer.id, "peer closed connection");
                    break;
                }
                Some(Ok(_)) => {
                    warn!(conn_id = %peer.id, "unexpected frame kind, ignoring");
                }
                Some(Err(e)) => {
                    error!(conn_id = %peer.id, error = %e, "read error");
                    break;
                }
            },
            result = &mut watchdog => {
                if matches!(result, Ok(HeartbeatResult::TimedOut)) {
                    counter!(RELAY_HEARTBEAT_EXPIRIES_TOTAL).increment(1);
                    warn!(
                        conn_id = %peer.id,
                        silent_secs = peer.last_pong_elapsed().as_secs(),
                        "heartbeat deadline expired"
                    );
                }
                break;
            }
            () = cancel.cancelled() => {
                info!(conn_id = %peer.id, "connection cancelled");
                break;
            }
        }
    }

    // Closing → Closed: deregister first, then the close frame, then the
    // socket itself, unconditionally, on every exit path.
    state.registry.deregister(&peer.id).await;
    cancel.cancel();
    if let Ok(mut ws_tx) = writer.await {
        let _ = tokio::time::timeout(
            state.config.write_timeout(),
            ws_tx.send(WsMessage::Close(None)),
        )
        .await;
    }
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    info!(conn_id = %peer.id, age_secs = peer.age().as_secs(), "peer disconnected");
}

/// Forward queued payloads and periodic pings to the socket.
///
/// This is the connection's single write path: broadcast fan-out and
/// heartbeat pings serialize through it, so frames can never interleave.
/// Returns the sink so the handler can send the close frame after
/// deregistering. A failed or timed-out write cancels the connection
/// token; a peer we cannot write to is as dead as one we cannot read.
async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, WsMessage>,
    mut queue: mpsc::Receiver<Arc<str>>,
    ping_interval: Duration,
    write_timeout: Duration,
    cancel: CancellationToken,
) -> SplitSink<WebSocket, WsMessage> {
    let mut pings = tokio::time::interval(ping_interval);
    // Consume the immediate first tick
    let _ = pings.tick().await;

    loop {
        let frame = tokio::select! {
            payload = queue.recv() => match payload {
                Some(text) => WsMessage::Text(Utf8Bytes::from(&*text)),
                None => break,
            },
            _ = pings.tick() => WsMessage::Ping(Bytes::new()),
            () = cancel.cancelled() => break,
        };
        match tokio::time::timeout(write_timeout, ws_tx.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(error = %e, "write failed");
                cancel.cancel();
                break;
            }
            Err(_) => {
                warn!("write deadline expired");
                cancel.cancel();
                break;
            }
        }
    }
    ws_tx
}
