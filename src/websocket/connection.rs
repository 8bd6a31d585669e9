//! Per-connection signaling state machine (spec §4.D). One task per accepted
//! WebSocket; it owns the `RTCPeerConnection` until the session reaches
//! `Connected`, then hands UDP<->DataChannel relaying off to [`crate::bridge`]
//! and keeps running only to pump trickle ICE and notice peer closure.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

use crate::app::AppState;
use crate::auth::secrets_match;
use crate::bridge;
use crate::peer::PeerEvent;
use crate::peer::PeerSession;
use crate::protocol::{ClientHello, SessionDescription, SignalingMessage};
use crate::session::{Session, SessionState};

use super::error::SignalingError;

type WsSender = SplitSink<WebSocket, Message>;
type WsReceiver = SplitStream<WebSocket>;

pub async fn handle_socket(socket: WebSocket, state: AppState, peer_addr: SocketAddr) {
    let (mut sender, mut receiver) = socket.split();

    let backend = match await_client(&mut receiver, &state).await {
        Ok(Some(backend)) => backend,
        Ok(None) => return,
        Err(err) => {
            close(&mut sender, err.close_code(), err.reason()).await;
            return;
        }
    };

    if state.config.enable_signaling_client_initiated {
        // DESIGN.md open question: the client-initiated wire contract
        // (adopting a remote-offered data channel pair) has no real client
        // in this relay's reference corpus to validate the exact handshake
        // against, so this build declines explicitly rather than guess it.
        let err = SignalingError::Malformed("client-initiated signaling is not supported");
        close(&mut sender, err.close_code(), err.reason()).await;
        return;
    }

    run_server_initiated(sender, receiver, state, backend, peer_addr).await;
}

/// `AwaitClient`: read the optional first frame, authenticate, and resolve
/// the backend 4-tuple. `Ok(None)` means the remote disconnected before
/// completing the hello, which needs no close frame of our own.
async fn await_client(receiver: &mut WsReceiver, state: &AppState) -> Result<Option<SocketAddr>, SignalingError> {
    let hello = match receiver.next().await {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientHello>(&text) {
            Ok(hello) => hello,
            Err(err) => {
                warn!(error = %err, "malformed signaling hello frame");
                return Err(SignalingError::Malformed("malformed first frame"));
            }
        },
        Some(Ok(Message::Close(_))) | None => return Ok(None),
        Some(Ok(_)) => return Err(SignalingError::Malformed("expected a JSON text frame")),
        Some(Err(err)) => {
            debug!(error = %err, "websocket receive error during AwaitClient");
            return Ok(None);
        }
    };

    if state.config.auth_required() {
        let expected = state.config.auth_token.as_deref().unwrap_or_default();
        let supplied = hello.token.as_deref().unwrap_or_default();
        if !secrets_match(expected, supplied) {
            warn!("signaling auth token mismatch");
            return Err(SignalingError::PolicyDenied("auth token mismatch"));
        }
    }

    let (host, port) = match hello.backend {
        Some(backend) => (backend.host, backend.port),
        None => (
            state.config.default_backend_host.clone(),
            state.config.default_backend_port,
        ),
    };

    if !state.policy.backend_allowed(&host) {
        warn!(%host, "backend denied by CIDR allow-list");
        return Err(SignalingError::PolicyDenied("backend not allow-listed"));
    }

    match format!("{host}:{port}").parse::<SocketAddr>() {
        Ok(addr) => Ok(Some(addr)),
        Err(_) => Err(SignalingError::Malformed("backend is not a valid host:port")),
    }
}

/// The canonical server-initiated path: `CreatePeer` → `SendOffer` →
/// `AwaitAnswer` → `IceExchange` + `WaitForDC` → `BridgeRun`.
async fn run_server_initiated(
    mut sender: WsSender,
    mut receiver: WsReceiver,
    state: AppState,
    backend: SocketAddr,
    peer_addr: SocketAddr,
) {
    let (peer, mut events_rx, session_id, udp) =
        match negotiate(&mut sender, &mut receiver, &state, peer_addr).await {
            Ok(Some(established)) => established,
            Ok(None) => return,
            Err(err) => {
                close(&mut sender, err.close_code(), err.reason()).await;
                return;
            }
        };

    let session = Arc::new(Session::new(session_id.clone(), peer.clone(), udp, backend));
    info!(session_id = %session_id, %backend, %peer_addr, "session created, awaiting data channels");

    // `IceExchange` and `WaitForDC` run concurrently until the peer reports
    // readiness, failure, or the remote end closes the socket.
    let dc_inbound_tx = loop {
        tokio::select! {
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => handle_ice_frame(&text, &peer).await,
                    Some(Ok(Message::Close(_))) | None => {
                        session.close().await;
                        return;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        debug!(error = %err, "websocket receive error during IceExchange");
                        session.close().await;
                        return;
                    }
                }
            }
            event = events_rx.recv() => {
                match event {
                    Some(PeerEvent::IceCandidate(candidate)) => {
                        let msg = SignalingMessage::Candidate(candidate);
                        if send_json(&mut sender, &msg).await.is_err() {
                            session.close().await;
                            return;
                        }
                    }
                    Some(PeerEvent::Ready) => {
                        session.set_state(SessionState::Connected);
                        session.touch();
                        let tx = bridge::spawn(session.clone(), state.metrics.clone());
                        state.registry.insert(session.clone());
                        info!(session_id = %session_id, "session connected, bridge running");
                        break tx;
                    }
                    Some(PeerEvent::Closed) | None => {
                        session.close().await;
                        return;
                    }
                    Some(PeerEvent::Inbound(_)) => {
                        // A "write" message arriving before both channels
                        // report `open` is a spec edge case (§4.E): the
                        // peer library only fires `on_message` once a
                        // channel is open, so this can't happen in
                        // practice, but it's harmless to drop here.
                    }
                }
            }
        }
    };

    run_bridge_event_loop(receiver, events_rx, peer, session, state, dc_inbound_tx).await;
}

/// `CreatePeer` → `SendOffer` → `AwaitAnswer`: everything up to (but not
/// including) the ICE/data-channel wait, collapsed into one `Result` so the
/// caller has a single place to turn a [`SignalingError`] into a close
/// frame. `Ok(None)` means the remote disconnected partway through and no
/// close frame is owed.
#[allow(clippy::type_complexity)]
async fn negotiate(
    sender: &mut WsSender,
    receiver: &mut WsReceiver,
    state: &AppState,
    peer_addr: SocketAddr,
) -> Result<Option<(Arc<PeerSession>, mpsc::Receiver<PeerEvent>, String, Arc<tokio::net::UdpSocket>)>, SignalingError> {
    let (events_tx, events_rx) = mpsc::channel::<PeerEvent>(32);

    let peer = PeerSession::new(stun_servers(), events_tx, state.config.datachannel_buffered_amount_low_water)
        .await
        .map_err(|err| {
            warn!(error = %err, "failed to create peer connection");
            SignalingError::Malformed("peer setup failed")
        })?;
    let peer = Arc::new(peer);

    let offer = peer.create_offer().await.map_err(|err| {
        warn!(error = %err, "failed to create SDP offer");
        SignalingError::Malformed("offer creation failed")
    })?;

    let offer_msg = SignalingMessage::Offer(SessionDescription {
        sdp_type: offer.sdp_type.to_string(),
        sdp: offer.sdp,
    });
    if send_json(sender, &offer_msg).await.is_err() {
        return Ok(None);
    }

    let answer_timeout = Duration::from_secs(state.config.answer_timeout_secs);
    let answer = match tokio::time::timeout(answer_timeout, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => match serde_json::from_str::<SignalingMessage>(&text) {
            Ok(SignalingMessage::Answer(desc)) => desc,
            Ok(_) => return Err(SignalingError::Malformed("expected an answer")),
            Err(err) => {
                warn!(error = %err, "malformed answer frame");
                return Err(SignalingError::Malformed("malformed answer frame"));
            }
        },
        Ok(Some(Ok(Message::Close(_)))) | Ok(None) => return Ok(None),
        Ok(Some(Ok(_))) => return Err(SignalingError::Malformed("expected a JSON text frame")),
        Ok(Some(Err(err))) => {
            debug!(error = %err, "websocket receive error during AwaitAnswer");
            return Ok(None);
        }
        Err(_) => {
            warn!(%peer_addr, "answer timed out");
            return Err(SignalingError::Timeout("answer timeout"));
        }
    };

    let remote = RTCSessionDescription::answer(answer.sdp).map_err(|err| {
        warn!(error = %err, "answer sdp rejected by webrtc stack");
        SignalingError::Malformed("invalid answer sdp")
    })?;
    peer.set_remote_description(remote).await.map_err(|err| {
        warn!(error = %err, "set_remote_description failed");
        SignalingError::Malformed("answer rejected")
    })?;

    let udp = tokio::net::UdpSocket::bind("0.0.0.0:0").await.map_err(|err| {
        warn!(error = %err, "failed to bind session udp socket");
        SignalingError::Malformed("udp bind failed")
    })?;

    let session_id = Uuid::new_v4().to_string();
    Ok(Some((peer, events_rx, session_id, Arc::new(udp))))
}

/// `BridgeRun`: the session is connected. This task's only remaining job is
/// to keep trickling ICE and to forward "write"-channel payloads into the
/// bridge's inbound queue, until the peer closes or the WebSocket drops.
async fn run_bridge_event_loop(
    mut receiver: WsReceiver,
    mut events_rx: mpsc::Receiver<PeerEvent>,
    peer: Arc<PeerSession>,
    session: Arc<Session>,
    state: AppState,
    dc_inbound_tx: mpsc::Sender<Vec<u8>>,
) {
    loop {
        tokio::select! {
            _ = session.cancel.cancelled() => break,
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => handle_ice_frame(&text, &peer).await,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
            event = events_rx.recv() => {
                match event {
                    Some(PeerEvent::Inbound(data)) => {
                        // Channel is unbounded-by-kernel-buffer only; a
                        // full queue here means the backend isn't draining
                        // fast enough, so this is a drop, not a block.
                        let _ = dc_inbound_tx.try_send(data);
                    }
                    Some(PeerEvent::Closed) | None => break,
                    Some(PeerEvent::IceCandidate(_)) | Some(PeerEvent::Ready) => {}
                }
            }
        }
    }

    session.close().await;
    state.registry.remove(&session.id);
    debug!(session_id = %session.id, "signaling connection finished");
}

async fn handle_ice_frame(text: &str, peer: &PeerSession) {
    match serde_json::from_str::<SignalingMessage>(text) {
        Ok(SignalingMessage::Candidate(candidate)) => {
            if let Err(err) = peer.add_ice_candidate(candidate).await {
                debug!(error = %err, "add_ice_candidate failed");
            }
        }
        // Spec §4.D: "malformed/unknown frames are ignored silently" during
        // `IceExchange`, unlike the stricter AwaitClient/AwaitAnswer steps.
        Ok(_) | Err(_) => {}
    }
}

fn stun_servers() -> Vec<String> {
    vec!["stun:stun.l.google.com:19302".to_string()]
}

async fn send_json(sender: &mut WsSender, msg: &SignalingMessage) -> Result<(), ()> {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(err) => {
            warn!(error = %err, "failed to serialize signaling message");
            return Err(());
        }
    };
    sender.send(Message::Text(json.into())).await.map_err(|err| {
        debug!(error = %err, "failed to send signaling message");
    })
}

async fn close(sender: &mut WsSender, code: u16, reason: &'static str) {
    let _ = sender
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}

