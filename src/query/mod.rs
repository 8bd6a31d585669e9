//! Source Engine Query client: A2S_INFO probing with challenge-retry,
//! trying the three known query bodies in order until one succeeds.

pub mod packet;

use packet::{build_query, parse_response, ParsedResponse, ServerInfo, QUERY_BODIES};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::timeout;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("failed to bind UDP socket: {0}")]
    Bind(#[source] std::io::Error),
    #[error("failed to send query: {0}")]
    Send(#[source] std::io::Error),
    #[error("no response from server")]
    Timeout,
    #[error("all query variants exhausted without a usable response")]
    Exhausted,
}

const MAX_DATAGRAM: usize = 1024;

/// A server found by scanning `discover` ports that wasn't already in the
/// configured catalog.
#[derive(Debug, Clone)]
pub struct DiscoveredServer {
    pub port: u16,
    pub info: ServerInfo,
}

/// Scan `ports` on `host` for a responding Source/GoldSrc server, skipping
/// any port already present in `exclude_ports` (spec §3 "Discovery may
/// augment the set at runtime by scanning a small range of well-known ports
/// on a configured host"). Ports are probed concurrently; a quiet port is
/// simply absent from the result rather than an error.
pub async fn discover(host: &str, ports: &[u16], exclude_ports: &[u16], timeout_ms: u64) -> Vec<DiscoveredServer> {
    let probes = ports
        .iter()
        .filter(|port| !exclude_ports.contains(port))
        .map(|&port| async move {
            probe(host, port, timeout_ms)
                .await
                .ok()
                .map(|info| DiscoveredServer { port, info })
        });

    futures_util::future::join_all(probes).await.into_iter().flatten().collect()
}

/// Probe `(host, port)` for server info, per spec §4.C. Transient failures
/// (timeout, no usable response) are distinguished from I/O setup errors so
/// callers can render `status: "offline"` either way without treating them
/// as a crash.
pub async fn probe(host: &str, port: u16, timeout_ms: u64) -> Result<ServerInfo, QueryError> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|_| QueryError::Timeout)?;
    let timeout_dur = Duration::from_millis(timeout_ms);

    let socket = UdpSocket::bind("0.0.0.0:0").await.map_err(QueryError::Bind)?;

    for body in QUERY_BODIES {
        // A timed-out or failed send on this body is that variant's
        // failure, not the whole probe's: the original `query_cs16_server`
        // wraps each attempt in `try/except ... continue` so a server that
        // ignores one query body still gets a chance to answer the next
        // one (spec §4.C step 5).
        match try_query(&socket, addr, body, timeout_dur).await {
            Ok(Some(info)) => return Ok(info),
            Ok(None) | Err(_) => continue,
        }
    }

    Err(QueryError::Exhausted)
}

/// Run one query body to completion, including a single challenge-retry
/// round. Returns `Ok(None)` when this variant yielded an empty/unusable
/// response so the caller moves on to the next query body.
async fn try_query(
    socket: &UdpSocket,
    addr: SocketAddr,
    body: &[u8],
    timeout_dur: Duration,
) -> Result<Option<ServerInfo>, QueryError> {
    let query = build_query(body, None);
    let datagram = send_recv(socket, addr, &query, timeout_dur).await?;

    match parse_response(&datagram) {
        ParsedResponse::Info(info) => Ok(Some(info)),
        ParsedResponse::Challenge(challenge) => {
            let retried = build_query(body, Some(challenge));
            let datagram = send_recv(socket, addr, &retried, timeout_dur).await?;
            match parse_response(&datagram) {
                ParsedResponse::Info(info) => Ok(Some(info)),
                _ => Ok(None),
            }
        }
        ParsedResponse::Empty => Ok(None),
    }
}

async fn send_recv(
    socket: &UdpSocket,
    addr: SocketAddr,
    query: &[u8],
    timeout_dur: Duration,
) -> Result<Vec<u8>, QueryError> {
    timeout(timeout_dur, socket.send_to(query, addr))
        .await
        .map_err(|_| QueryError::Timeout)?
        .map_err(QueryError::Send)?;

    let mut buf = [0u8; MAX_DATAGRAM];
    let (len, _) = timeout(timeout_dur, socket.recv_from(&mut buf))
        .await
        .map_err(|_| QueryError::Timeout)?
        .map_err(|_| QueryError::Timeout)?;

    Ok(buf[..len].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use packet::{CONNECTIONLESS_PREFIX, TYPE_CHALLENGE, TYPE_SOURCE_INFO};

    fn source_info_reply() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&CONNECTIONLESS_PREFIX);
        buf.push(TYPE_SOURCE_INFO);
        buf.push(0x11);
        buf.extend_from_slice(b"srv\0de_dust2\0cstrike\0Counter-Strike\0");
        buf.extend_from_slice(&[0x01, 0x00]);
        buf.push(5);
        buf.push(16);
        buf
    }

    #[tokio::test]
    async fn probe_succeeds_against_fake_upstream() {
        let upstream = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let upstream_addr = upstream.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let (_, from) = upstream.recv_from(&mut buf).await.unwrap();
            upstream.send_to(&source_info_reply(), from).await.unwrap();
        });

        let info = probe(&upstream_addr.ip().to_string(), upstream_addr.port(), 500)
            .await
            .unwrap();
        assert_eq!(info.name, "srv");
        assert_eq!(info.players, 5);
        assert_eq!(info.max_players, 16);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn probe_follows_challenge_then_parses_info() {
        let upstream = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let upstream_addr = upstream.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let mut sent = 0u32;

            let (_, from) = upstream.recv_from(&mut buf).await.unwrap();
            sent += 1;
            let mut challenge = Vec::new();
            challenge.extend_from_slice(&CONNECTIONLESS_PREFIX);
            challenge.push(TYPE_CHALLENGE);
            challenge.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
            upstream.send_to(&challenge, from).await.unwrap();

            let (n, from) = upstream.recv_from(&mut buf).await.unwrap();
            sent += 1;
            assert!(buf[..n].ends_with(&[0xDE, 0xAD, 0xBE, 0xEF]));
            upstream.send_to(&source_info_reply(), from).await.unwrap();

            sent
        });

        let info = probe(&upstream_addr.ip().to_string(), upstream_addr.port(), 500)
            .await
            .unwrap();
        assert_eq!(info.map, "de_dust2");
        let datagrams_sent = server.await.unwrap();
        assert_eq!(datagrams_sent, 2);
    }

    #[tokio::test]
    async fn probe_falls_through_to_next_body_after_a_timeout() {
        let upstream = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let upstream_addr = upstream.local_addr().unwrap();

        // Stays silent on the first query body (`TSource Engine Query\0`,
        // forcing a timeout) and only answers the second (`info\0`).
        let server = tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let (n, from) = upstream.recv_from(&mut buf).await.unwrap();
            assert!(buf[..n].starts_with(b"\xFF\xFF\xFF\xFFTSource"));

            let (_, from2) = upstream.recv_from(&mut buf).await.unwrap();
            assert_eq!(from2, from);
            upstream.send_to(&source_info_reply(), from2).await.unwrap();
        });

        let info = probe(&upstream_addr.ip().to_string(), upstream_addr.port(), 200)
            .await
            .unwrap();
        assert_eq!(info.name, "srv");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn probe_times_out_against_silent_upstream() {
        let upstream = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = upstream.local_addr().unwrap();
        // Nothing ever replies; bound the test by using a short timeout.
        let result = probe(&addr.ip().to_string(), addr.port(), 50).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn discover_finds_only_responding_ports() {
        let upstream = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let live_port = upstream.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let (_, from) = upstream.recv_from(&mut buf).await.unwrap();
            upstream.send_to(&source_info_reply(), from).await.unwrap();
        });

        // A second, never-bound port in the scan range should simply be
        // absent from the result, not an error.
        let dead_port = live_port.wrapping_add(1);
        let found = discover("127.0.0.1", &[live_port, dead_port], &[], 200).await;

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].port, live_port);
        assert_eq!(found[0].info.name, "srv");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn discover_skips_excluded_ports() {
        let found = discover("127.0.0.1", &[27015], &[27015], 50).await;
        assert!(found.is_empty());
    }
}
