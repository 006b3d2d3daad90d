use async_trait::async_trait;
use thiserror::Error;

/// A single question addressed to one user in one channel. The edit flow
/// only ever needs one turn, so the seam is ask-and-wait rather than a
/// full dialog tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Question {
    pub channel_id: String,
    pub user_id: String,
    pub prompt: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationReply {
    pub text: String,
}

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("conversation engine unavailable: {0}")]
    Unavailable(String),
    #[error("user abandoned the conversation")]
    Abandoned,
}

/// Capability to ask a user a question and await their next message.
/// Production wires this to the chat platform; tests script the answers.
#[async_trait]
pub trait ConversationEngine: Send + Sync {
    async fn ask(&self, question: Question) -> Result<ConversationReply, ConversationError>;
}

/// Placeholder engine that answers `cancel` to every question, so an
/// unwired deployment never mutates articles through the edit flow.
pub struct NoopConversationEngine;

#[async_trait]
impl ConversationEngine for NoopConversationEngine {
    async fn ask(&self, _question: Question) -> Result<ConversationReply, ConversationError> {
        Ok(ConversationReply { text: "cancel".to_string() })
    }
}
