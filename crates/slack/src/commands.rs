use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use helpdevil_core::{Article, ArticleId, Team, TeamId};
use helpdevil_store::TeamStore;

use crate::replies::{
    add_usage_reply, added_confirmation_reply, button_demo_reply, empty_center_reply, help_reply,
    list_reply, unknown_command_reply, Reply,
};

/// One `/helpdevil ...` invocation as delivered by the platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub text: String,
    pub team_id: TeamId,
    pub team_domain: Option<String>,
    pub channel_id: String,
    pub user_id: String,
    /// Timestamp of the triggering message, doubles as the article id
    /// for `add` because it is unique per channel message.
    pub trigger_ts: String,
    pub verification_token: String,
    pub request_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HelpdeskCommand {
    Add { raw_entry: String },
    List,
    Button,
    Help,
    Unknown { text: String },
}

/// Splits the command text on its first whitespace token. An empty text
/// gets the help message, same as an explicit `help`.
pub fn classify_command(text: &str) -> HelpdeskCommand {
    let trimmed = text.trim();
    let (keyword, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (trimmed, ""),
    };

    match keyword {
        "add" => HelpdeskCommand::Add { raw_entry: rest.to_string() },
        "list" => HelpdeskCommand::List,
        "button" => HelpdeskCommand::Button,
        "help" | "" => HelpdeskCommand::Help,
        _ => HelpdeskCommand::Unknown { text: trimmed.to_string() },
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewEntry {
    pub title: String,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AddParseError {
    #[error("add entry is missing the `>` separator")]
    MissingSeparator,
    #[error("add entry uses the `>` separator more than once")]
    TooManySeparators,
}

/// Parses `<title> > <description>`. Slack html-escapes `>` in command
/// text, so the entity form is normalized first.
pub fn parse_add_entry(raw: &str) -> Result<NewEntry, AddParseError> {
    let normalized = raw.replace("&gt;", ">");
    let parts: Vec<&str> = normalized.split('>').collect();
    match parts.as_slice() {
        [_single] => Err(AddParseError::MissingSeparator),
        [title, description] => Ok(NewEntry {
            title: title.trim().to_string(),
            description: description.trim().to_string(),
        }),
        _ => Err(AddParseError::TooManySeparators),
    }
}

#[derive(Debug, Error)]
pub enum CommandRouteError {
    #[error("command service failed: {0}")]
    Service(String),
}

/// Domain side of the slash-command surface. The router owns parsing and
/// reply selection; implementations own team records.
#[async_trait]
pub trait HelpdeskCommandService: Send + Sync {
    async fn add_article(
        &self,
        entry: NewEntry,
        payload: &SlashCommandPayload,
    ) -> Result<Reply, CommandRouteError>;

    async fn list_articles(&self, payload: &SlashCommandPayload)
        -> Result<Reply, CommandRouteError>;
}

pub struct CommandRouter<S: HelpdeskCommandService> {
    service: Arc<S>,
}

impl<S: HelpdeskCommandService> CommandRouter<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }

    pub async fn route(&self, payload: &SlashCommandPayload) -> Result<Reply, CommandRouteError> {
        if payload.command != "/helpdevil" {
            warn!(
                command = %payload.command,
                request_id = %payload.request_id,
                "unsupported slash command"
            );
            return Ok(unknown_command_reply(&payload.text));
        }

        match classify_command(&payload.text) {
            HelpdeskCommand::Add { raw_entry } => match parse_add_entry(&raw_entry) {
                Ok(entry) => {
                    info!(
                        team_id = %payload.team_id.0,
                        request_id = %payload.request_id,
                        "adding help center article"
                    );
                    self.service.add_article(entry, payload).await
                }
                Err(error) => Ok(add_usage_reply(&error)),
            },
            HelpdeskCommand::List => self.service.list_articles(payload).await,
            HelpdeskCommand::Button => Ok(button_demo_reply()),
            HelpdeskCommand::Help => Ok(help_reply()),
            HelpdeskCommand::Unknown { text } => Ok(unknown_command_reply(&text)),
        }
    }
}

/// Command service backed by the team store. Storage failures degrade to
/// warnings so the user always gets an answer; the record simply may not
/// stick until the backend recovers.
pub struct StoreBackedHelpdeskService {
    store: Arc<dyn TeamStore>,
}

impl StoreBackedHelpdeskService {
    pub fn new(store: Arc<dyn TeamStore>) -> Self {
        Self { store }
    }

    async fn fetch_or_shell(&self, team_id: &TeamId) -> Team {
        match self.store.get(team_id).await {
            Ok(Some(team)) => team,
            Ok(None) => Team::shell(team_id.clone()),
            Err(error) => {
                warn!(team_id = %team_id.0, error = %error, "team lookup failed, using empty record");
                Team::shell(team_id.clone())
            }
        }
    }

    async fn persist(&self, team: Team) {
        let team_id = team.id.0.clone();
        if let Err(error) = self.store.save(team).await {
            warn!(team_id = %team_id, error = %error, "failed to persist team record");
        }
    }
}

#[async_trait]
impl HelpdeskCommandService for StoreBackedHelpdeskService {
    async fn add_article(
        &self,
        entry: NewEntry,
        payload: &SlashCommandPayload,
    ) -> Result<Reply, CommandRouteError> {
        let mut team = self.fetch_or_shell(&payload.team_id).await;
        if team.domain.is_none() {
            team.domain = payload.team_domain.clone();
        }

        let title = entry.title.clone();
        team.push_article(Article {
            id: ArticleId(payload.trigger_ts.clone()),
            title: entry.title,
            description: entry.description,
            content: None,
        });
        self.persist(team).await;

        Ok(added_confirmation_reply(&title))
    }

    async fn list_articles(
        &self,
        payload: &SlashCommandPayload,
    ) -> Result<Reply, CommandRouteError> {
        let team = self.fetch_or_shell(&payload.team_id).await;
        if team.articles.is_empty() {
            return Ok(empty_center_reply());
        }
        let reply = list_reply(&team);
        // Deliberate no-op write: refreshes the stored record shape.
        self.persist(team).await;
        Ok(reply)
    }
}
