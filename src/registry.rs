//! `SessionRegistry`: concurrent session lookup, insert-on-signaling-complete,
//! and the idle reaper task (spec §4.G, §4.F.3).

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::session::Session;

/// Live sessions keyed by session id. `DashMap` gives lock-free reads and a
/// short per-shard critical section on insert/remove, matching the
/// concurrency model in spec §5 ("no cross-session shared mutable state
/// beyond the registry and the metrics counters").
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Arc<Session>) {
        self.sessions.insert(session.id.clone(), session);
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.remove(id).map(|(_, session)| session)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Snapshot of currently-live session ids, used by the reaper tick so it
    /// doesn't hold any `DashMap` shard lock while awaiting `close()`.
    fn idle_candidates(&self, idle_sec: u64) -> Vec<Arc<Session>> {
        self.sessions
            .iter()
            .filter(|entry| entry.value().is_idle(idle_sec))
            .map(|entry| entry.value().clone())
            .collect()
    }
}

/// Spawn the 1-second reaper tick. Closing a session here only transitions
/// it to `Closing`/`Closed`; removal from the map happens once its bridge
/// tasks observe the cancellation and the signaling task drops its handle.
pub fn spawn_idle_reaper(registry: Arc<SessionRegistry>, idle_sec: u64, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("idle reaper shutting down");
                    break;
                }
                _ = tick.tick() => {
                    for session in registry.idle_candidates(idle_sec) {
                        debug!(session_id = %session.id, "reaping idle session");
                        session.close().await;
                        registry.remove(&session.id);
                    }
                }
            }
        }
    })
}
