//! Backend policy: CIDR allow-listing of UDP destinations, and the server
//! catalog used by `/servers` and `/heartbeat`.

use std::net::IpAddr;
use std::str::FromStr;

use ip_network::IpNetwork;
use thiserror::Error;

/// Fatal at startup: an unparseable CIDR in `RELAY_ALLOWED_BACKENDS` (spec
/// §7 `ConfigError`, scoped to the policy module per §10.C's per-module
/// error enum convention).
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("'{raw}' is not a valid CIDR network: {source}")]
    InvalidCidr {
        raw: String,
        #[source]
        source: ip_network::IpNetworkParseError,
    },
}

/// Ordered union of CIDR networks permitted as UDP relay destinations.
#[derive(Debug, Clone)]
pub struct BackendPolicy {
    networks: Vec<IpNetwork>,
}

impl BackendPolicy {
    /// Parse `RELAY_ALLOWED_BACKENDS` entries; fails on the first unparseable
    /// CIDR (fatal `ConfigError` at startup, per spec §7).
    pub fn parse(cidrs: &[String]) -> Result<Self, PolicyError> {
        let networks = cidrs
            .iter()
            .map(|raw| {
                IpNetwork::from_str(raw.trim()).map_err(|source| PolicyError::InvalidCidr {
                    raw: raw.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { networks })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    /// `backend_allowed(host)`: `host` must be an IP literal (DNS names
    /// always return `false`) contained in at least one configured network.
    #[must_use]
    pub fn backend_allowed(&self, host: &str) -> bool {
        let Ok(addr) = host.parse::<IpAddr>() else {
            return false;
        };
        self.networks.iter().any(|net| net.contains(addr))
    }
}

/// One entry in the server catalog (`SERVER_LIST`).
#[derive(Debug, Clone)]
pub struct ServerEntry {
    pub host: String,
    pub port: u16,
}

impl ServerEntry {
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parses `SERVER_LIST` entries of the form `host` or `host:port`.
#[derive(Debug, Clone, Default)]
pub struct ServerCatalog {
    entries: Vec<ServerEntry>,
}

impl ServerCatalog {
    pub fn parse(raw_entries: &[String], default_port: u16) -> Self {
        let entries = raw_entries
            .iter()
            .filter_map(|raw| parse_host_port(raw, default_port))
            .collect();
        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[ServerEntry] {
        &self.entries
    }

    /// The backend every sidecar client is bound to (see DESIGN.md open
    /// question #3: per-client routing is unimplemented).
    #[must_use]
    pub fn primary(&self) -> Option<&ServerEntry> {
        self.entries.first()
    }
}

fn parse_host_port(raw: &str, default_port: u16) -> Option<ServerEntry> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    match raw.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().ok()?;
            Some(ServerEntry {
                host: host.to_string(),
                port,
            })
        }
        None => Some(ServerEntry {
            host: raw.to_string(),
            port: default_port,
        }),
    }
}
