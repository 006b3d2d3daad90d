use async_trait::async_trait;
use sqlx::Row;

use helpdevil_core::{Team, TeamId};

use crate::teams::{StoreError, TeamStore};
use crate::DbPool;

/// SQLite-backed team store. Records are stored as one JSON document per
/// team, keeping the schema identical in shape to the flat-file backend.
pub struct SqliteTeamStore {
    pool: DbPool,
}

impl SqliteTeamStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TeamStore for SqliteTeamStore {
    async fn get(&self, id: &TeamId) -> Result<Option<Team>, StoreError> {
        let row = sqlx::query("SELECT record FROM teams WHERE id = ?1")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let raw: String = row.get("record");
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, team: Team) -> Result<(), StoreError> {
        let record = serde_json::to_string(&team)?;
        sqlx::query(
            "INSERT INTO teams (id, record) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET record = excluded.record",
        )
        .bind(&team.id.0)
        .bind(record)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Team>, StoreError> {
        let rows = sqlx::query("SELECT record FROM teams ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                let raw: String = row.get("record");
                serde_json::from_str(&raw).map_err(StoreError::from)
            })
            .collect()
    }
}
