//! Root configuration type.

use super::defaults::*;
use super::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

/// Root configuration for the relay, assembled entirely from process
/// environment variables (see [`super::loader::load`]).
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Name reported in `/health` and attached to log lines.
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// TCP listen port (`PORT`).
    #[serde(default = "default_port")]
    pub port: u16,
    /// `RELAY_ALLOWED_ORIGINS`, comma list or `*`.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: String,
    /// `RELAY_ALLOWED_BACKENDS`, comma list of CIDR strings.
    #[serde(default = "default_allowed_backends")]
    pub allowed_backends: Vec<String>,
    /// `RELAY_DEFAULT_BACKEND_HOST`.
    #[serde(default = "default_backend_host")]
    pub default_backend_host: String,
    /// `RELAY_DEFAULT_BACKEND_PORT`.
    #[serde(default = "default_backend_port")]
    pub default_backend_port: u16,
    /// `SERVER_LIST`, comma list of `host[:port]`.
    #[serde(default)]
    pub server_list: Vec<String>,
    /// `RELAY_AUTH_TOKEN`; when non-empty, signaling requires a matching token.
    #[serde(default)]
    pub auth_token: Option<String>,
    /// `RELAY_IDLE_SEC`.
    #[serde(default = "default_idle_sec")]
    pub idle_sec: u64,
    /// `RELAY_DATACHANNEL_BUFFERED_AMOUNT_LOW_WATER`, in bytes.
    #[serde(default = "default_datachannel_buffered_amount_low_water")]
    pub datachannel_buffered_amount_low_water: usize,
    /// `RELAY_ENABLE_SIGNALING_CLIENT_INITIATED`.
    #[serde(default = "default_enable_signaling_client_initiated")]
    pub enable_signaling_client_initiated: bool,
    /// Source Engine Query per-datagram timeout, milliseconds.
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
    /// Signaling `AwaitAnswer` timeout, seconds.
    #[serde(default = "default_answer_timeout_secs")]
    pub answer_timeout_secs: u64,
    /// `RELAY_ENABLE_SERVER_DISCOVERY`: scan `discovery_ports` on
    /// `default_backend_host` to augment the configured catalog (spec §3
    /// "Discovery may augment the set at runtime").
    #[serde(default = "default_enable_server_discovery")]
    pub enable_server_discovery: bool,
    /// Ports scanned on `default_backend_host` when discovery is enabled.
    #[serde(default = "default_discovery_ports")]
    pub discovery_ports: Vec<u16>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
            allowed_backends: default_allowed_backends(),
            default_backend_host: default_backend_host(),
            default_backend_port: default_backend_port(),
            server_list: Vec::new(),
            auth_token: None,
            idle_sec: default_idle_sec(),
            datachannel_buffered_amount_low_water: default_datachannel_buffered_amount_low_water(),
            enable_signaling_client_initiated: default_enable_signaling_client_initiated(),
            query_timeout_ms: default_query_timeout_ms(),
            answer_timeout_secs: default_answer_timeout_secs(),
            enable_server_discovery: default_enable_server_discovery(),
            discovery_ports: default_discovery_ports(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// `true` if a non-empty shared token is configured.
    #[must_use]
    pub fn auth_required(&self) -> bool {
        self.auth_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}
