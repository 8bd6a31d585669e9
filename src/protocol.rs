//! Wire types shared by the signaling endpoint and the sidecar ingress.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Signaling envelope exchanged over `/websocket` and `/signal` (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum SignalingMessage {
    Offer(SessionDescription),
    Answer(SessionDescription),
    Candidate(IceCandidate),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: String,
    pub sdp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(
        rename = "sdpMLineIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_mline_index: Option<u16>,
}

/// The optional first-frame auth/backend-selection message a client may send
/// before the signaling state machine creates a peer (spec §4.D `AwaitClient`).
#[derive(Debug, Clone, Deserialize)]
pub struct ClientHello {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub backend: Option<HelloBackend>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HelloBackend {
    pub host: String,
    pub port: u16,
}

/// Sidecar ingress packet (spec §4.H), accepted in three equivalent `data`
/// encodings and always normalized to raw bytes.
#[derive(Debug, Clone, Deserialize)]
pub struct GamePacket {
    pub client_ip: [u8; 4],
    pub data: GamePacketData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GamePacketData {
    Bytes(Vec<u8>),
    Base64(String),
}

impl GamePacketData {
    /// Normalize any accepted encoding to raw bytes. Base64 text that fails
    /// to decode yields an empty payload rather than panicking; callers treat
    /// it as a dropped packet.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Bytes(bytes) => bytes,
            Self::Base64(text) => BASE64.decode(text.as_bytes()).unwrap_or_default(),
        }
    }
}

/// Sidecar egress frame sent over `WS /ws-from-go`.
#[derive(Debug, Clone, Serialize)]
pub struct GamePacketEgress {
    pub client_ip: [u8; 4],
    pub data: Vec<u8>,
}
