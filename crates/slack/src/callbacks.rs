use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use helpdevil_core::{ArticleId, EditField, Team, TeamId};
use helpdevil_store::TeamStore;

use crate::conversation::{ConversationEngine, ConversationError, Question};
use crate::replies::{
    article_gone_reply, detail_reply, edit_applied_reply, edit_cancelled_reply, edit_question,
    list_reply, Reply,
};

/// Builds the opaque id attached to every article card. Components are
/// percent-escaped so a `-` inside a team or article id cannot shift the
/// separator.
pub fn encode_callback_id(team_id: &TeamId, article_id: &ArticleId) -> String {
    format!("{}-{}", escape_component(&team_id.0), escape_component(&article_id.0))
}

/// Inverse of [`encode_callback_id`]. Returns `None` for ids we did not
/// mint, such as the button demo card.
pub fn parse_callback_id(callback_id: &str) -> Option<(TeamId, ArticleId)> {
    let (team, article) = callback_id.split_once('-')?;
    if article.contains('-') {
        return None;
    }
    Some((TeamId(unescape_component(team)?), ArticleId(unescape_component(article)?)))
}

fn escape_component(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '%' => escaped.push_str("%25"),
            '-' => escaped.push_str("%2D"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn unescape_component(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch == '%' {
            let hi = hex_nibble(chars.next()?)?;
            let lo = hex_nibble(chars.next()?)?;
            out.push(((hi << 4) | lo) as char);
        } else {
            out.push(ch);
        }
    }
    Some(out)
}

fn hex_nibble(ch: char) -> Option<u8> {
    ch.to_digit(16).map(|digit| digit as u8)
}

/// One button click, already lifted out of the interactive-message payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackEvent {
    pub callback_id: String,
    pub action: CallbackAction,
    pub channel_id: String,
    pub user_id: String,
    pub message_ts: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    More,
    Delete,
    Edit(EditField),
    Unknown(String),
}

impl CallbackAction {
    pub fn from_name(name: &str) -> Self {
        match name {
            "more" => Self::More,
            "delete" => Self::Delete,
            "editTitle" => Self::Edit(EditField::Title),
            "editShortDescription" => Self::Edit(EditField::Description),
            "editContent" => Self::Edit(EditField::Content),
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// How the caller should answer the interactive request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Post a fresh message in the channel.
    Reply(Reply),
    /// Replace the message the button lives on.
    ReplaceOriginal(Reply),
    /// Acknowledge and say nothing.
    Silent,
}

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("conversation failed: {0}")]
    Conversation(#[from] ConversationError),
}

/// Routes button clicks back to the article they belong to.
///
/// Storage failures degrade to warnings so a flaky backend never leaves a
/// button click unanswered; the conversational edit flow is the only path
/// that surfaces an error, because half of it happens in the user's face.
pub struct CallbackRouter {
    store: Arc<dyn TeamStore>,
    conversation: Arc<dyn ConversationEngine>,
}

impl CallbackRouter {
    pub fn new(store: Arc<dyn TeamStore>, conversation: Arc<dyn ConversationEngine>) -> Self {
        Self { store, conversation }
    }

    pub async fn handle(&self, event: CallbackEvent) -> Result<CallbackOutcome, CallbackError> {
        let Some((team_id, article_id)) = parse_callback_id(&event.callback_id) else {
            warn!(callback_id = %event.callback_id, "unrecognized callback id, ignoring");
            return Ok(CallbackOutcome::Silent);
        };

        let mut team = self.fetch_or_shell(&team_id).await;
        let Some(article) = team.find_article(&article_id).cloned() else {
            warn!(
                team_id = %team_id.0,
                article_id = %article_id.0,
                "callback for an article that no longer exists"
            );
            return Ok(CallbackOutcome::Silent);
        };

        match event.action {
            CallbackAction::More => Ok(CallbackOutcome::Reply(detail_reply(&team, &article))),
            CallbackAction::Delete => {
                team.remove_article(&article_id);
                let reply = list_reply(&team);
                self.persist(team).await;
                Ok(CallbackOutcome::ReplaceOriginal(reply))
            }
            CallbackAction::Edit(field) => self.run_edit(&team_id, &article_id, field, &event).await,
            CallbackAction::Unknown(name) => {
                warn!(action = %name, "unsupported callback action, ignoring");
                Ok(CallbackOutcome::Silent)
            }
        }
    }

    async fn run_edit(
        &self,
        team_id: &TeamId,
        article_id: &ArticleId,
        field: EditField,
        event: &CallbackEvent,
    ) -> Result<CallbackOutcome, CallbackError> {
        let answer = self
            .conversation
            .ask(Question {
                channel_id: event.channel_id.clone(),
                user_id: event.user_id.clone(),
                prompt: edit_question(field),
            })
            .await?;

        if answer.text.trim() == "cancel" {
            return Ok(CallbackOutcome::Reply(edit_cancelled_reply()));
        }

        // The article may have been deleted while the question was open,
        // so resolve it again rather than trusting anything captured
        // before the ask.
        let mut team = self.fetch_or_shell(team_id).await;
        let Some(article) = team.find_article_mut(article_id) else {
            return Ok(CallbackOutcome::Reply(article_gone_reply()));
        };

        field.apply(article, answer.text);
        let article = article.clone();
        let reply = edit_applied_reply(&team, &article, field);
        self.persist(team).await;
        Ok(CallbackOutcome::Reply(reply))
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

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use helpdevil_core::{Article, ArticleId, EditField, Team, TeamId};
    use helpdevil_store::{InMemoryTeamStore, TeamStore};

    use super::{
        encode_callback_id, parse_callback_id, CallbackAction, CallbackEvent, CallbackOutcome,
        CallbackRouter,
    };
    use crate::conversation::{ConversationEngine, ConversationError, ConversationReply, Question};

    struct ScriptedConversation {
        answers: Mutex<VecDeque<String>>,
        questions: Mutex<Vec<Question>>,
    }

    impl ScriptedConversation {
        fn answering(answers: &[&str]) -> Self {
            Self {
                answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
                questions: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ConversationEngine for ScriptedConversation {
        async fn ask(&self, question: Question) -> Result<ConversationReply, ConversationError> {
            self.questions.lock().await.push(question);
            let text = self
                .answers
                .lock()
                .await
                .pop_front()
                .ok_or_else(|| ConversationError::Unavailable("script exhausted".to_string()))?;
            Ok(ConversationReply { text })
        }
    }

    async fn seeded_store() -> Arc<InMemoryTeamStore> {
        let store = Arc::new(InMemoryTeamStore::new());
        let mut team = Team::shell(TeamId("T1".to_string()));
        team.push_article(Article {
            id: ArticleId("1730000000.0001".to_string()),
            title: "Guitar".to_string(),
            description: "Makes music".to_string(),
            content: None,
        });
        team.push_article(Article {
            id: ArticleId("1730000000.0002".to_string()),
            title: "Piano".to_string(),
            description: "Also makes music".to_string(),
            content: None,
        });
        store.save(team).await.expect("seed team");
        store
    }

    fn click(article_id: &str, action: CallbackAction) -> CallbackEvent {
        CallbackEvent {
            callback_id: encode_callback_id(
                &TeamId("T1".to_string()),
                &ArticleId(article_id.to_string()),
            ),
            action,
            channel_id: "C1".to_string(),
            user_id: "U1".to_string(),
            message_ts: "1730000001.0001".to_string(),
        }
    }

    #[test]
    fn callback_id_round_trips_plain_components() {
        let id = encode_callback_id(
            &TeamId("T1".to_string()),
            &ArticleId("1730000000.0001".to_string()),
        );
        let (team, article) = parse_callback_id(&id).expect("parse");
        assert_eq!(team.0, "T1");
        assert_eq!(article.0, "1730000000.0001");
    }

    #[test]
    fn callback_id_round_trips_hyphenated_components() {
        let id = encode_callback_id(
            &TeamId("team-one".to_string()),
            &ArticleId("art-%-42".to_string()),
        );
        assert_eq!(id.matches('-').count(), 1, "only the separator stays literal");

        let (team, article) = parse_callback_id(&id).expect("parse");
        assert_eq!(team.0, "team-one");
        assert_eq!(article.0, "art-%-42");
    }

    #[test]
    fn action_names_map_to_their_callback_actions() {
        assert_eq!(CallbackAction::from_name("more"), CallbackAction::More);
        assert_eq!(CallbackAction::from_name("delete"), CallbackAction::Delete);
        assert_eq!(
            CallbackAction::from_name("editTitle"),
            CallbackAction::Edit(EditField::Title)
        );
        assert_eq!(
            CallbackAction::from_name("editShortDescription"),
            CallbackAction::Edit(EditField::Description)
        );
        assert_eq!(
            CallbackAction::from_name("editContent"),
            CallbackAction::Edit(EditField::Content)
        );
        assert_eq!(
            CallbackAction::from_name("yes"),
            CallbackAction::Unknown("yes".to_string())
        );
    }

    #[test]
    fn foreign_callback_ids_do_not_parse() {
        assert_eq!(parse_callback_id("button-demo-extra"), None);
        assert_eq!(parse_callback_id("noseparator"), None);
    }

    #[tokio::test]
    async fn more_replies_with_the_detail_card_without_persisting() {
        let store = seeded_store().await;
        let router = CallbackRouter::new(
            store.clone(),
            Arc::new(ScriptedConversation::answering(&[])),
        );

        let outcome = router
            .handle(click("1730000000.0001", CallbackAction::More))
            .await
            .expect("handle more");

        let CallbackOutcome::Reply(reply) = outcome else {
            panic!("expected a reply, got {outcome:?}");
        };
        assert_eq!(reply.attachments[0].title, "Guitar");

        let team = store.get(&TeamId("T1".to_string())).await.expect("get").expect("team");
        assert_eq!(team.articles.len(), 2, "more must not mutate the record");
    }

    #[tokio::test]
    async fn delete_replaces_the_list_and_persists_the_removal() {
        let store = seeded_store().await;
        let router = CallbackRouter::new(
            store.clone(),
            Arc::new(ScriptedConversation::answering(&[])),
        );

        let outcome = router
            .handle(click("1730000000.0001", CallbackAction::Delete))
            .await
            .expect("handle delete");

        let CallbackOutcome::ReplaceOriginal(reply) = outcome else {
            panic!("expected a replacement, got {outcome:?}");
        };
        assert_eq!(reply.attachments.len(), 1);
        assert_eq!(reply.attachments[0].title, "Piano");

        let team = store.get(&TeamId("T1".to_string())).await.expect("get").expect("team");
        assert_eq!(team.articles.len(), 1);
        assert_eq!(team.articles[0].title, "Piano");
    }

    #[tokio::test]
    async fn edit_applies_the_answer_to_the_chosen_field() {
        let store = seeded_store().await;
        let conversation = Arc::new(ScriptedConversation::answering(&["Electric Guitar"]));
        let router = CallbackRouter::new(store.clone(), conversation.clone());

        let outcome = router
            .handle(click("1730000000.0001", CallbackAction::Edit(EditField::Title)))
            .await
            .expect("handle edit");

        let CallbackOutcome::Reply(reply) = outcome else {
            panic!("expected a reply, got {outcome:?}");
        };
        assert!(reply.text.contains("title has been updated"));
        assert_eq!(reply.attachments[0].title, "Electric Guitar");

        let questions = conversation.questions.lock().await;
        assert_eq!(questions.len(), 1);
        assert!(questions[0].prompt.contains("*title*"));

        let team = store.get(&TeamId("T1".to_string())).await.expect("get").expect("team");
        assert_eq!(team.articles[0].title, "Electric Guitar");
        assert_eq!(team.articles[0].description, "Makes music", "other fields stay put");
    }

    #[tokio::test]
    async fn edit_cancel_keyword_leaves_the_article_alone() {
        let store = seeded_store().await;
        let router = CallbackRouter::new(
            store.clone(),
            Arc::new(ScriptedConversation::answering(&["cancel"])),
        );

        let outcome = router
            .handle(click("1730000000.0001", CallbackAction::Edit(EditField::Content)))
            .await
            .expect("handle edit");

        let CallbackOutcome::Reply(reply) = outcome else {
            panic!("expected a reply, got {outcome:?}");
        };
        assert!(reply.text.contains("not editing"));

        let team = store.get(&TeamId("T1".to_string())).await.expect("get").expect("team");
        assert_eq!(team.articles[0].content, None);
    }

    #[tokio::test]
    async fn edit_answer_for_a_deleted_article_reports_it_gone() {
        let store = seeded_store().await;

        struct DeletingConversation {
            store: Arc<InMemoryTeamStore>,
        }

        #[async_trait]
        impl ConversationEngine for DeletingConversation {
            async fn ask(
                &self,
                _question: Question,
            ) -> Result<ConversationReply, ConversationError> {
                // Simulates another user deleting the article while the
                // question is open.
                let mut team = self
                    .store
                    .get(&TeamId("T1".to_string()))
                    .await
                    .expect("get")
                    .expect("team");
                team.remove_article(&ArticleId("1730000000.0001".to_string()));
                self.store.save(team).await.expect("save");
                Ok(ConversationReply { text: "New title".to_string() })
            }
        }

        let router = CallbackRouter::new(
            store.clone(),
            Arc::new(DeletingConversation { store: store.clone() }),
        );

        let outcome = router
            .handle(click("1730000000.0001", CallbackAction::Edit(EditField::Title)))
            .await
            .expect("handle edit");

        let CallbackOutcome::Reply(reply) = outcome else {
            panic!("expected a reply, got {outcome:?}");
        };
        assert!(reply.text.contains("no longer exists"));

        let team = store.get(&TeamId("T1".to_string())).await.expect("get").expect("team");
        assert_eq!(team.articles.len(), 1, "the stale edit must not resurrect the article");
        assert_eq!(team.articles[0].title, "Piano");
    }

    #[tokio::test]
    async fn malformed_callback_ids_are_silently_ignored() {
        let store = seeded_store().await;
        let router = CallbackRouter::new(
            store.clone(),
            Arc::new(ScriptedConversation::answering(&[])),
        );

        let outcome = router
            .handle(CallbackEvent {
                callback_id: "noseparator".to_string(),
                action: CallbackAction::More,
                channel_id: "C1".to_string(),
                user_id: "U1".to_string(),
                message_ts: "1730000001.0001".to_string(),
            })
            .await
            .expect("handle");

        assert_eq!(outcome, CallbackOutcome::Silent);
    }

    #[tokio::test]
    async fn clicks_for_missing_articles_are_silently_ignored() {
        let store = seeded_store().await;
        let router = CallbackRouter::new(
            store.clone(),
            Arc::new(ScriptedConversation::answering(&[])),
        );

        let outcome = router
            .handle(click("1730000000.9999", CallbackAction::Delete))
            .await
            .expect("handle");

        assert_eq!(outcome, CallbackOutcome::Silent);
        let team = store.get(&TeamId("T1".to_string())).await.expect("get").expect("team");
        assert_eq!(team.articles.len(), 2);
    }
}
