//! Server-side `RTCPeerConnection` wrapper: server-initiated offer/answer,
//! trickle ICE, and the two unreliable/unordered data channels that carry
//! game traffic (spec §4.D, §4.E).

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

use crate::protocol::IceCandidate;

/// The "write" channel carries client→server game traffic; "read" carries
/// server→client traffic. Both are unreliable and unordered: a dropped or
/// reordered UDP datagram should never stall on retransmission.
pub const WRITE_LABEL: &str = "write";
pub const READ_LABEL: &str = "read";

/// Events a [`PeerSession`] emits to its owning signaling connection.
#[derive(Debug)]
pub enum PeerEvent {
    /// A locally gathered ICE candidate to trickle to the client.
    IceCandidate(IceCandidate),
    /// Both data channels are open; the bridge may start relaying.
    Ready,
    /// The underlying peer connection failed, disconnected, or closed.
    Closed,
    /// A datagram arrived on the "write" channel, bound for the backend.
    Inbound(Vec<u8>),
}

/// A single client's WebRTC peer connection plus its two data channels.
pub struct PeerSession {
    pc: Arc<RTCPeerConnection>,
    write_dc: Arc<RTCDataChannel>,
    read_dc: Arc<RTCDataChannel>,
    buffered_amount_low_water: usize,
}

impl PeerSession {
    /// Build a peer connection with a STUN-only ICE configuration, create
    /// both data channels, and wire up the event callbacks. The connection
    /// is not yet offered; call [`Self::create_offer`] next.
    pub async fn new(ice_servers: Vec<String>, events: mpsc::Sender<PeerEvent>, buffered_amount_low_water: usize) -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let config = RTCConfiguration {
            ice_servers: vec![RTCIceServer {
                urls: ice_servers,
                ..Default::default()
            }],
            ..Default::default()
        };

        let pc = Arc::new(api.new_peer_connection(config).await?);

        let init = RTCDataChannelInit {
            ordered: Some(false),
            max_retransmits: Some(0),
            ..Default::default()
        };
        let write_dc = pc.create_data_channel(WRITE_LABEL, Some(init.clone())).await?;
        let read_dc = pc.create_data_channel(READ_LABEL, Some(init)).await?;

        Self::wire_ice_candidates(&pc, events.clone());
        Self::wire_connection_state(&pc, events.clone());
        Self::wire_data_channel(&write_dc, events.clone());
        Self::wire_open_gate(&write_dc, &read_dc, events);

        Ok(Self {
            pc,
            write_dc,
            read_dc,
            buffered_amount_low_water,
        })
    }

    fn wire_ice_candidates(pc: &Arc<RTCPeerConnection>, events: mpsc::Sender<PeerEvent>) {
        pc.on_ice_candidate(Box::new(move |candidate| {
            let events = events.clone();
            Box::pin(async move {
                let Some(candidate) = candidate else { return };
                let Ok(json) = candidate.to_json() else { return };
                let _ = events
                    .send(PeerEvent::IceCandidate(IceCandidate {
                        candidate: json.candidate,
                        sdp_mid: json.sdp_mid,
                        sdp_mline_index: json.sdp_mline_index,
                    }))
                    .await;
            })
        }));
    }

    fn wire_connection_state(pc: &Arc<RTCPeerConnection>, events: mpsc::Sender<PeerEvent>) {
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            let events = events.clone();
            Box::pin(async move {
                match state {
                    RTCPeerConnectionState::Disconnected
                    | RTCPeerConnectionState::Failed
                    | RTCPeerConnectionState::Closed => {
                        let _ = events.send(PeerEvent::Closed).await;
                    }
                    _ => {}
                }
            })
        }));
    }

    fn wire_data_channel(write_dc: &Arc<RTCDataChannel>, events: mpsc::Sender<PeerEvent>) {
        write_dc.on_message(Box::new(move |msg: DataChannelMessage| {
            let events = events.clone();
            Box::pin(async move {
                let _ = events.send(PeerEvent::Inbound(msg.data.to_vec())).await;
            })
        }));
    }

    /// Both channels must reach `open` before the bridge is told the session
    /// is ready; the browser opens them in an unspecified order.
    fn wire_open_gate(write_dc: &Arc<RTCDataChannel>, read_dc: &Arc<RTCDataChannel>, events: mpsc::Sender<PeerEvent>) {
        let opened = Arc::new(std::sync::atomic::AtomicU8::new(0));

        let opened_write = opened.clone();
        let events_write = events.clone();
        write_dc.on_open(Box::new(move || {
            let opened = opened_write.clone();
            let events = events_write.clone();
            Box::pin(async move {
                if opened.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1 == 2 {
                    let _ = events.send(PeerEvent::Ready).await;
                }
            })
        }));

        read_dc.on_open(Box::new(move || {
            let opened = opened.clone();
            let events = events.clone();
            Box::pin(async move {
                if opened.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1 == 2 {
                    let _ = events.send(PeerEvent::Ready).await;
                }
            })
        }));
    }

    /// Create the server-initiated offer and wait for ICE gathering to
    /// finish (or a timeout) so the returned SDP carries every host/srflx
    /// candidate, trickle ICE still carries any gathered afterward.
    pub async fn create_offer(&self) -> Result<RTCSessionDescription> {
        let offer = self.pc.create_offer(None).await?;
        let mut gather_complete = self.pc.gathering_complete_promise().await;
        self.pc.set_local_description(offer).await?;
        let _ = tokio::time::timeout(std::time::Duration::from_secs(5), gather_complete.recv()).await;

        self.pc
            .local_description()
            .await
            .context("local description missing after set_local_description")
    }

    pub async fn set_remote_description(&self, answer: RTCSessionDescription) -> Result<()> {
        self.pc.set_remote_description(answer).await?;
        Ok(())
    }

    pub async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.pc
            .add_ice_candidate(RTCIceCandidateInit {
                candidate: candidate.candidate,
                sdp_mid: candidate.sdp_mid,
                sdp_mline_index: candidate.sdp_mline_index,
                username_fragment: None,
            })
            .await?;
        Ok(())
    }

    /// Send a datagram to the client over the "read" channel, dropping it if
    /// the channel's buffered amount is already past the configured
    /// low-water mark (spec §4.F backpressure).
    pub async fn send_to_client(&self, data: &[u8]) -> Result<bool> {
        if self.read_dc.buffered_amount().await > self.buffered_amount_low_water {
            return Ok(false);
        }
        self.read_dc.send(&bytes::Bytes::copy_from_slice(data)).await?;
        Ok(true)
    }

    pub async fn close(&self) -> Result<()> {
        let _ = self.write_dc.close().await;
        let _ = self.read_dc.close().await;
        self.pc.close().await?;
        Ok(())
    }
}

