//! Heartbeat liveness watchdog.
//!
//! Pings are written by the connection's writer loop; this task only
//! watches the pong side. At each interval tick it consumes the peer's
//! alive flag, and once enough consecutive ticks pass without a pong the
//! peer is declared dead.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use super::connection::PeerConnection;

/// Outcome of the watchdog loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// No pong arrived within the deadline window.
    TimedOut,
    /// The connection is going away for another reason.
    Cancelled,
}

/// Watch a peer's pong responses.
///
/// `max_missed` is `timeout / interval` (clamped to at least 1), so with
/// the interval strictly shorter than the window a healthy peer always
/// resets the count before it can reach the limit.
pub async fn run_heartbeat(
    peer: Arc<PeerConnection>,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let mut ticks = time::interval(interval);
    // The first tick completes immediately; skip it so the peer gets a
    // full interval before its first check.
    let _ = ticks.tick().await;

    let interval_ms = interval.as_millis().max(1);
    #[allow(clippy::cast_possible_truncation)]
    let max_missed = ((timeout.as_millis() / interval_ms) as u32).max(1);
    let mut missed: u32 = 0;

    loop {
        tokio::select! {
            _ = ticks.tick() => {
                if peer.check_alive() {
                    missed = 0;
                } else {
                    missed += 1;
                    if missed >= max_missed {
                        return HeartbeatResult::TimedOut;
                    }
                }
                // Not alive again until the next pong
                peer.is_alive.store(false, Ordering::Relaxed);
            }
            () = cancel.cancelled() => {
                return HeartbeatResult::Cancelled;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn make_peer() -> Arc<PeerConnection> {
        let (tx, _rx) = mpsc::channel(32);
        Arc::new(PeerConnection::new("hb_conn".into(), tx))
    }

    #[tokio::test]
    async fn cancelled_immediately() {
        let peer = make_peer();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = run_heartbeat(
            peer,
            Duration::from_secs(100),
            Duration::from_secs(300),
            cancel,
        )
        .await;
        assert_eq!(result, HeartbeatResult::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_peer_times_out() {
        let peer = make_peer();
        peer.is_alive.store(false, Ordering::Relaxed);

        let result = run_heartbeat(
            peer,
            Duration::from_millis(100),
            Duration::from_millis(300),
            CancellationToken::new(),
        )
        .await;
        assert_eq!(result, HeartbeatResult::TimedOut);
    }

    #[tokio::test]
    async fn responsive_peer_never_times_out() {
        let peer = make_peer();
        let watched = Arc::clone(&peer);
        let cancel = CancellationToken::new();
        let watchdog_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            run_heartbeat(
                watched,
                Duration::from_millis(50),
                Duration::from_millis(150),
                watchdog_cancel,
            )
            .await
        });

        // Keep ponging for a few intervals
        for _ in 0..6 {
            tokio::time::sleep(Duration::from_millis(25)).await;
            peer.mark_alive();
        }

        cancel.cancel();
        let result = handle.await.unwrap();
        assert_eq!(result, HeartbeatResult::Cancelled);
    }

    #[tokio::test]
    async fn pong_resets_missed_count() {
        let peer = make_peer();
        let watched = Arc::clone(&peer);
        let cancel = CancellationToken::new();
        let watchdog_cancel = cancel.clone();

        // Window allows 3 missed ticks
        let handle = tokio::spawn(async move {
            run_heartbeat(
                watched,
                Duration::from_millis(60),
                Duration::from_millis(180),
                watchdog_cancel,
            )
            .await
        });

        // Pong once every two ticks, so never three misses in a row
        for _ in 0..5 {
            tokio::time::sleep(Duration::from_millis(110)).await;
            peer.mark_alive();
        }

        cancel.cancel();
        let result = handle.await.unwrap();
        assert_eq!(result, HeartbeatResult::Cancelled);
    }

    #[tokio::test]
    async fn cancel_during_wait() {
        let peer = make_peer();
        let cancel = CancellationToken::new();
        let watchdog_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            run_heartbeat(
                peer,
                Duration::from_secs(60),
                Duration::from_secs(180),
                watchdog_cancel,
            )
            .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        let result = handle.await.unwrap();
        assert_eq!(result, HeartbeatResult::Cancelled);
    }

    #[test]
    fn result_equality_and_debug() {
        assert_eq!(HeartbeatResult::TimedOut, HeartbeatResult::TimedOut);
        assert_ne!(HeartbeatResult::TimedOut, HeartbeatResult::Cancelled);
        assert!(format!("{:?}", HeartbeatResult::TimedOut).contains("TimedOut"));
    }
}
