use async_trait::async_trait;
use thiserror::Error;

use helpdevil_core::{Team, TeamId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("record encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("team id `{0}` is not a valid storage key")]
    InvalidTeamId(String),
}

/// Key-value persistence for team records. Last writer wins; callers do
/// read-modify-write without any optimistic concurrency check.
#[async_trait]
pub trait TeamStore: Send + Sync {
    async fn get(&self, id: &TeamId) -> Result<Option<Team>, StoreError>;
    async fn save(&self, team: Team) -> Result<(), StoreError>;
    async fn all(&self) -> Result<Vec<Team>, StoreError>;
}
