//! Browser-to-UDP game relay: WebRTC signaling bridge for legacy
//! Source/GoldSrc game servers.
//!
//! # Module Structure
//!
//! - [`app`]: shared `AppState` handle cloned into every handler/task
//! - [`config`]: environment-driven configuration, validation, defaults
//! - [`policy`]: CIDR backend allow-list and the server catalog
//! - [`query`]: Source Engine Query client (A2S_INFO probing)
//! - [`protocol`]: signaling envelope and sidecar wire types
//! - [`peer`]: server-side `RTCPeerConnection` + data channel wrapper
//! - [`session`]: per-peer session state machine
//! - [`bridge`]: the DataChannel<->UDP pump
//! - [`registry`]: concurrent session map + idle reaper
//! - [`websocket`]: signaling state machine and HTTP/WS router
//! - [`sidecar`]: optional HTTP-ingress / WS-egress alternate topology
//! - [`auth`]: constant-time shared-token comparison
//! - [`metrics`]: Prometheus counters
//! - [`logging`]: tracing/tracing-subscriber initialization

pub mod app;
pub mod auth;
pub mod bridge;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod peer;
pub mod policy;
pub mod protocol;
pub mod query;
pub mod registry;
pub mod session;
pub mod sidecar;
pub mod websocket;

pub use app::AppState;
