//! Session state machine and per-session resources (spec §3 data model).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::peer::PeerSession;

/// `Signaling` → `Connected` → `Closing` → `Closed`, per spec §3. Stored as a
/// single atomic so the signaling task, the bridge tasks, and the reaper can
/// all observe and transition it without a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Signaling,
    Connected,
    Closing,
    Closed,
}

impl SessionState {
    fn to_u8(self) -> u8 {
        match self {
            Self::Signaling => 0,
            Self::Connected => 1,
            Self::Closing => 2,
            Self::Closed => 3,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Connected,
            2 => Self::Closing,
            _ if v == 3 => Self::Closed,
            _ => Self::Signaling,
        }
    }
}

/// One accepted peer: its WebRTC peer/channels, its bound UDP 4-tuple, and
/// the bookkeeping the bridge and reaper need. Owned by the registry once
/// signaling completes; the bridge tasks and the reaper each hold an `Arc`.
pub struct Session {
    pub id: String,
    pub peer: Arc<PeerSession>,
    pub udp: Arc<UdpSocket>,
    pub backend: SocketAddr,
    pub cancel: CancellationToken,
    state: AtomicU8,
    started: Instant,
    last_activity_ns: AtomicU64,
}

impl Session {
    #[must_use]
    pub fn new(id: String, peer: Arc<PeerSession>, udp: Arc<UdpSocket>, backend: SocketAddr) -> Self {
        Self {
            id,
            peer,
            udp,
            backend,
            cancel: CancellationToken::new(),
            state: AtomicU8::new(SessionState::Signaling.to_u8()),
            started: Instant::now(),
            last_activity_ns: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn set_state(&self, state: SessionState) {
        self.state.store(state.to_u8(), Ordering::SeqCst);
    }

    /// Record activity now; called on every datagram in either direction.
    /// `last_activity_ns` is monotonically non-decreasing by construction
    /// since `Instant::elapsed` never goes backwards.
    pub fn touch(&self) {
        let now_ns = self.started.elapsed().as_nanos() as u64;
        self.last_activity_ns.store(now_ns, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_idle(&self, idle_sec: u64) -> bool {
        let now_ns = self.started.elapsed().as_nanos() as u64;
        let last_ns = self.last_activity_ns.load(Ordering::Relaxed);
        now_ns.saturating_sub(last_ns) > idle_sec.saturating_mul(1_000_000_000)
    }

    /// Close both DataChannels, the peer connection, and cancel the
    /// session's bridge tasks. Safe to call more than once: the state
    /// transition to `Closed` is the guard, not a separate flag.
    pub async fn close(&self) {
        if self.state() == SessionState::Closed {
            return;
        }
        self.set_state(SessionState::Closing);
        self.cancel.cancel();
        let _ = self.peer.close().await;
        self.set_state(SessionState::Closed);
    }
}
