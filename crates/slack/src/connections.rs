use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use helpdevil_core::TeamId;
use helpdevil_store::TeamStore;

/// Process-scoped registry of live realtime sessions, keyed by team id.
/// Guards against opening a second session for a team that already has
/// one, for instance when a startup sweep races a provisioning event.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashSet<String>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the team as connected. Returns `false` when it already was.
    pub async fn track(&self, team_id: &TeamId) -> bool {
        self.connections.write().await.insert(team_id.0.clone())
    }

    pub async fn is_tracked(&self, team_id: &TeamId) -> bool {
        self.connections.read().await.contains(&team_id.0)
    }

    pub async fn tracked_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("realtime connect failed: {0}")]
    Failed(String),
}

/// Capability to open a realtime session for one team.
#[async_trait]
pub trait RealtimeConnector: Send + Sync {
    async fn connect(&self, team_id: &TeamId) -> Result<(), ConnectError>;
}

pub struct NoopRealtimeConnector;

#[async_trait]
impl RealtimeConnector for NoopRealtimeConnector {
    async fn connect(&self, _team_id: &TeamId) -> Result<(), ConnectError> {
        Ok(())
    }
}

/// Startup sweep: reopens a session for every stored team whose bot was
/// provisioned. Individual failures are logged and skipped so one broken
/// team cannot block the rest. Returns how many sessions were opened.
pub async fn reconnect_all(
    store: &dyn TeamStore,
    connector: &dyn RealtimeConnector,
    registry: &ConnectionRegistry,
) -> usize {
    let teams = match store.all().await {
        Ok(teams) => teams,
        Err(error) => {
            warn!(error = %error, "could not list teams for reconnect sweep");
            return 0;
        }
    };

    let mut reconnected = 0;
    for team in teams {
        if !team.bot_connected {
            continue;
        }
        if registry.is_tracked(&team.id).await {
            continue;
        }
        match connector.connect(&team.id).await {
            Ok(()) => {
                registry.track(&team.id).await;
                info!(team_id = %team.id.0, "reopened realtime session");
                reconnected += 1;
            }
            Err(error) => {
                warn!(team_id = %team.id.0, error = %error, "reconnect failed, skipping team");
            }
        }
    }
    reconnected
}
