//! Shared application state: the one long-lived handle cloned into every
//! axum handler and background task (spec §5 "no cross-session shared
//! mutable state beyond the registry and the metrics counters").

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::metrics::Metrics;
use crate::policy::{BackendPolicy, ServerCatalog};
use crate::protocol::GamePacketEgress;
use crate::registry::SessionRegistry;
use crate::sidecar::SidecarRegistry;

/// Everything a request handler or background task needs. Cheap to clone:
/// every field is an `Arc` (or, for `Config`, treated as immutable after
/// startup).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub metrics: Arc<Metrics>,
    pub policy: Arc<BackendPolicy>,
    pub catalog: Arc<ServerCatalog>,
    pub registry: Arc<SessionRegistry>,
    pub sidecar: Arc<SidecarRegistry>,
    /// Fan-out of sidecar egress frames to every attached `/ws-from-go`
    /// connection. Receivers are created per-connection via `subscribe()`.
    pub sidecar_egress: broadcast::Sender<GamePacketEgress>,
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Build application state from a validated [`Config`]. Fails only if
    /// the backend allow-list fails to parse, which `config::validate`
    /// should already have caught at startup.
    pub fn new(config: Config) -> Result<Self, crate::policy::PolicyError> {
        let policy = BackendPolicy::parse(&config.allowed_backends)?;
        let catalog = ServerCatalog::parse(&config.server_list, config.default_backend_port);
        let (sidecar_egress, _) = broadcast::channel(1024);

        Ok(Self {
            config: Arc::new(config),
            metrics: Arc::new(Metrics::new()),
            policy: Arc::new(policy),
            catalog: Arc::new(catalog),
            registry: Arc::new(SessionRegistry::new()),
            sidecar: Arc::new(SidecarRegistry::new()),
            sidecar_egress,
            shutdown: CancellationToken::new(),
        })
    }
}
