//! Default value functions for configuration fields.
//!
//! Mirrors the literal defaults enumerated in the relay's environment variable
//! contract: one function per field, so `#[serde(default = ...)]` and the
//! env-loader share a single source of truth.

pub fn default_service_name() -> String {
    "webrtc-udp-relay".to_string()
}

pub const fn default_port() -> u16 {
    8080
}

pub fn default_allowed_origins() -> String {
    "*".to_string()
}

/// `RELAY_ALLOWED_BACKENDS` default: RFC 1918 `10.0.0.0/8` plus loopback.
pub fn default_allowed_backends() -> Vec<String> {
    vec!["10.0.0.0/8".to_string(), "127.0.0.0/8".to_string()]
}

pub fn default_backend_host() -> String {
    "127.0.0.1".to_string()
}

pub const fn default_backend_port() -> u16 {
    27015
}

pub const fn default_idle_sec() -> u64 {
    300
}

pub const fn default_datachannel_buffered_amount_low_water() -> usize {
    256 * 1024
}

pub const fn default_enable_signaling_client_initiated() -> bool {
    false
}

pub const fn default_query_timeout_ms() -> u64 {
    1500
}

pub const fn default_answer_timeout_secs() -> u64 {
    10
}

/// `RELAY_ENABLE_SERVER_DISCOVERY`: off by default. The upstream relay this
/// was distilled from always scans; here it's opt-in since blind-probing a
/// configured host's port range on every `/servers` request is surprising
/// behavior for a relay that otherwise only talks to allow-listed backends.
pub const fn default_enable_server_discovery() -> bool {
    false
}

/// Common CS 1.6 / GoldSrc ports scanned on the default backend host when
/// discovery is enabled, matching the upstream relay's `ports_to_check`.
pub fn default_discovery_ports() -> Vec<u16> {
    vec![27015, 27016, 27017, 27018, 27019]
}
