use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use helpdevil_core::{Team, TeamId};

use crate::teams::{StoreError, TeamStore};

/// Flat-file team store: one `<team id>.json` per team in a single
/// directory. This is the zero-dependency deployment fallback when no
/// database URL is configured.
pub struct JsonFileTeamStore {
    dir: PathBuf,
}

impl JsonFileTeamStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub async fn ensure_dir(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    fn record_path(&self, id: &TeamId) -> Result<PathBuf, StoreError> {
        // Team ids become file names; anything that could escape the
        // directory is rejected rather than sanitized.
        let valid = !id.0.is_empty()
            && id.0.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        if !valid {
            return Err(StoreError::InvalidTeamId(id.0.clone()));
        }
        Ok(self.dir.join(format!("{}.json", id.0)))
    }
}

#[async_trait]
impl TeamStore for JsonFileTeamStore {
    async fn get(&self, id: &TeamId) -> Result<Option<Team>, StoreError> {
        let path = self.record_path(id)?;
        match fs::read_to_string(&path).await {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    async fn save(&self, team: Team) -> Result<(), StoreError> {
        let path = self.record_path(&team.id)?;
        fs::create_dir_all(&self.dir).await?;
        let record = serde_json::to_string_pretty(&team)?;
        fs::write(&path, record).await?;
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Team>, StoreError> {
        let mut teams = Vec::new();
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(teams),
            Err(error) => return Err(error.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let raw = fs::read_to_string(&path).await?;
            teams.push(serde_json::from_str::<Team>(&raw)?);
        }

        teams.sort_by(|left, right| left.id.0.cmp(&right.id.0));
        Ok(teams)
    }
}

impl JsonFileTeamStore {
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use helpdevil_core::{Article, ArticleId, Team, TeamId};

    use super::JsonFileTeamStore;
    use crate::teams::{StoreError, TeamStore};

    fn team(id: &str) -> Team {
        let mut team = Team::shell(TeamId(id.to_string()));
        team.push_article(Article {
            id: ArticleId("1730000000.0001".to_string()),
            title: "Guitar".to_string(),
            description: "Makes music".to_string(),
            content: None,
        });
        team
    }

    #[tokio::test]
    async fn round_trips_a_team_record() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonFileTeamStore::new(dir.path());

        let record = team("T1");
        store.save(record.clone()).await.expect("save team");
        let found = store.get(&record.id).await.expect("get team");

        assert_eq!(found, Some(record));
    }

    #[tokio::test]
    async fn get_on_missing_file_returns_none() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonFileTeamStore::new(dir.path());

        let found = store.get(&TeamId("T404".to_string())).await.expect("get");
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn all_reads_every_record_in_the_directory() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonFileTeamStore::new(dir.path());

        store.save(team("T2")).await.expect("save T2");
        store.save(team("T1")).await.expect("save T1");

        let teams = store.all().await.expect("list teams");
        let ids: Vec<&str> = teams.iter().map(|t| t.id.0.as_str()).collect();
        assert_eq!(ids, vec!["T1", "T2"]);
    }

    #[tokio::test]
    async fn all_on_missing_directory_is_empty() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonFileTeamStore::new(dir.path().join("never-created"));

        let teams = store.all().await.expect("list teams");
        assert!(teams.is_empty());
    }

    #[tokio::test]
    async fn path_escaping_team_ids_are_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonFileTeamStore::new(dir.path());

        let error = store
            .save(Team::shell(TeamId("../evil".to_string())))
            .await
            .expect_err("traversal id must fail");
        assert!(matches!(error, StoreError::InvalidTeamId(_)));
    }
}
