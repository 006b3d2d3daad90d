use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use helpdevil_core::{Team, TeamId};

use crate::teams::{StoreError, TeamStore};

#[derive(Default)]
pub struct InMemoryTeamStore {
    teams: RwLock<HashMap<String, Team>>,
}

impl InMemoryTeamStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TeamStore for InMemoryTeamStore {
    async fn get(&self, id: &TeamId) -> Result<Option<Team>, StoreError> {
        let teams = self.teams.read().await;
        Ok(teams.get(&id.0).cloned())
    }

    async fn save(&self, team: Team) -> Result<(), StoreError> {
        let mut teams = self.teams.write().await;
        teams.insert(team.id.0.clone(), team);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Team>, StoreError> {
        let teams = self.teams.read().await;
        let mut records: Vec<Team> = teams.values().cloned().collect();
        records.sort_by(|left, right| left.id.0.cmp(&right.id.0));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use helpdevil_core::{Article, ArticleId, Team, TeamId};

    use super::InMemoryTeamStore;
    use crate::teams::TeamStore;

    #[tokio::test]
    async fn round_trips_a_team_record() {
        let store = InMemoryTeamStore::default();
        let mut team = Team::shell(TeamId("T1".to_string()));
        team.push_article(Article {
            id: ArticleId("1730000000.0001".to_string()),
            title: "Guitar".to_string(),
            description: "Makes music".to_string(),
            content: None,
        });

        store.save(team.clone()).await.expect("save team");
        let found = store.get(&team.id).await.expect("get team");

        assert_eq!(found, Some(team));
    }

    #[tokio::test]
    async fn all_lists_every_saved_team() {
        let store = InMemoryTeamStore::default();
        store.save(Team::shell(TeamId("T2".to_string()))).await.expect("save T2");
        store.save(Team::shell(TeamId("T1".to_string()))).await.expect("save T1");

        let teams = store.all().await.expect("list teams");
        let ids: Vec<&str> = teams.iter().map(|team| team.id.0.as_str()).collect();
        assert_eq!(ids, vec!["T1", "T2"]);
    }

    #[tokio::test]
    async fn get_on_unknown_team_returns_none() {
        let store = InMemoryTeamStore::default();
        let found = store.get(&TeamId("missing".to_string())).await.expect("get");
        assert_eq!(found, None);
    }
}
