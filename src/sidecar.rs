//! Sidecar ingress (spec §4.H): the optional alternative topology where a
//! separate front-end terminates WebRTC signaling and this process only
//! pumps game packets over HTTP/WebSocket instead of owning the peer.
//!
//! Ingress: `POST /game-packet` with a `{client_ip, data}` body. Egress:
//! every currently-attached `GET /ws-from-go` connection receives every
//! packet read back from any sidecar client's UDP socket, as a JSON frame.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::app::AppState;
use crate::protocol::{GamePacket, GamePacketEgress};

const UDP_READ_BUF: usize = 2048;

/// One sidecar client's UDP socket, keyed by its reported `client_ip`.
/// Unlike a browser [`crate::session::Session`], this has no WebRTC peer:
/// it exists purely to pump bytes between the front-end and a backend.
struct SidecarClient {
    udp: Arc<UdpSocket>,
    backend: SocketAddr,
}

/// Live sidecar clients, keyed by the 4-octet `client_ip` the front-end
/// reports (spec §4.G: "for the sidecar mode, by `client_ip` 4-tuple").
#[derive(Default)]
pub struct SidecarRegistry {
    clients: DashMap<[u8; 4], Arc<SidecarClient>>,
}

impl SidecarRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// `POST /game-packet`: accept one ingress packet, create the client's UDP
/// socket on first sight, forward to the backend, count it.
pub async fn game_packet_handler(
    State(state): State<AppState>,
    Json(packet): Json<GamePacket>,
) -> Response {
    let Some(backend_entry) = state.catalog.primary() else {
        warn!("sidecar game-packet received with no servers configured");
        return (StatusCode::INTERNAL_SERVER_ERROR, "no servers configured").into_response();
    };

    let backend: SocketAddr = match format!("{}:{}", backend_entry.host, backend_entry.port).parse() {
        Ok(addr) => addr,
        Err(_) => {
            warn!(host = %backend_entry.host, "sidecar default backend is not an IP literal");
            return (StatusCode::INTERNAL_SERVER_ERROR, "backend unresolvable").into_response();
        }
    };

    let client = match get_or_create_client(&state, packet.client_ip, backend).await {
        Ok(client) => client,
        Err(err) => {
            warn!(error = %err, "failed to bind sidecar client UDP socket");
            return (StatusCode::INTERNAL_SERVER_ERROR, "udp bind failed").into_response();
        }
    };

    let bytes = packet.data.into_bytes();
    match client.udp.send_to(&bytes, client.backend).await {
        Ok(_) => {
            state.metrics.inc_go_to_python();
            StatusCode::OK.into_response()
        }
        Err(err) => {
            debug!(error = %err, "sidecar ingress send dropped");
            StatusCode::OK.into_response()
        }
    }
}

async fn get_or_create_client(
    state: &AppState,
    client_ip: [u8; 4],
    backend: SocketAddr,
) -> Result<Arc<SidecarClient>, std::io::Error> {
    if let Some(existing) = state.sidecar.clients.get(&client_ip) {
        return Ok(existing.clone());
    }

    let udp = Arc::new(UdpSocket::bind("0.0.0.0:0").await?);
    let client = Arc::new(SidecarClient { udp: udp.clone(), backend });
    state.sidecar.clients.insert(client_ip, client.clone());

    tokio::spawn(pump_udp_to_egress(
        client_ip,
        udp,
        state.metrics.clone(),
        state.sidecar_egress.clone(),
    ));

    Ok(client)
}

/// Read datagrams back from one sidecar client's backend and fan them out
/// to every attached `/ws-from-go` connection.
async fn pump_udp_to_egress(
    client_ip: [u8; 4],
    udp: Arc<UdpSocket>,
    metrics: Arc<crate::metrics::Metrics>,
    egress: broadcast::Sender<GamePacketEgress>,
) {
    let mut buf = [0u8; UDP_READ_BUF];
    loop {
        match udp.recv_from(&mut buf).await {
            Ok((len, _from)) => {
                metrics.inc_python_to_go();
                let frame = GamePacketEgress {
                    client_ip,
                    data: buf[..len].to_vec(),
                };
                // No attached egress connections is not an error; the
                // packet is simply dropped.
                let _ = egress.send(frame);
            }
            Err(err) => {
                warn!(error = %err, "sidecar udp recv_from failed");
                break;
            }
        }
    }
}

/// `GET /ws-from-go`: stream every sidecar egress frame to this connection
/// as JSON, until the socket closes.
pub async fn ws_from_go_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_ws_from_go(socket, state))
}

async fn handle_ws_from_go(socket: WebSocket, state: AppState) {
    let mut rx = state.sidecar_egress.subscribe();
    let (mut sender, mut receiver) = socket.split();

    let forward = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(frame) => {
                    let Ok(json) = serde_json::to_string(&frame) else { continue };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // The sidecar egress socket is write-only from the relay's perspective;
    // drain and discard anything the front-end sends so the connection
    // doesn't appear half-closed.
    while let Some(Ok(_)) = receiver.next().await {}

    forward.abort();
}
