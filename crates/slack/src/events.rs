use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{debug, info, warn};

use helpdevil_core::{Team, TeamId};
use helpdevil_store::TeamStore;

use crate::callbacks::{CallbackError, CallbackEvent, CallbackOutcome, CallbackRouter};
use crate::commands::{
    CommandRouteError, CommandRouter, HelpdeskCommandService, SlashCommandPayload,
};
use crate::connections::{ConnectionRegistry, RealtimeConnector};
use crate::replies::{welcome_reply, Reply};

/// Envelope wrapper as delivered over the realtime transport. The
/// envelope id must be acknowledged regardless of what the event is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HelpdeskEnvelope {
    pub envelope_id: String,
    pub event: HelpdeskEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HelpdeskEvent {
    SlashCommand(SlashCommandPayload),
    InteractiveCallback(CallbackEvent),
    BotProvisioned(BotProvisionedEvent),
    Unsupported { event_type: String },
}

impl HelpdeskEvent {
    pub fn event_type(&self) -> Option<HelpdeskEventType> {
        match self {
            Self::SlashCommand(_) => Some(HelpdeskEventType::SlashCommand),
            Self::InteractiveCallback(_) => Some(HelpdeskEventType::InteractiveCallback),
            Self::BotProvisioned(_) => Some(HelpdeskEventType::BotProvisioned),
            Self::Unsupported { .. } => None,
        }
    }

    pub fn team_id(&self) -> Option<&str> {
        match self {
            Self::SlashCommand(payload) => Some(&payload.team_id.0),
            Self::BotProvisioned(event) => Some(&event.team_id.0),
            Self::InteractiveCallback(_) | Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HelpdeskEventType {
    SlashCommand,
    InteractiveCallback,
    BotProvisioned,
}

/// A new bot user was provisioned for a workspace, typically right after
/// the OAuth install completes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotProvisionedEvent {
    pub team_id: TeamId,
    pub created_by: String,
}

#[derive(Clone, Debug)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_string() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    /// Post this reply in the originating channel.
    Responded(Reply),
    /// Replace the interactive message this event came from.
    Replaced(Reply),
    /// Handled, nothing to say.
    Processed,
    /// Deliberately dropped.
    Ignored,
}

#[derive(Debug, Error)]
pub enum EventHandlerError {
    #[error(transparent)]
    Command(#[from] CommandRouteError),
    #[error(transparent)]
    Callback(#[from] CallbackError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(
        &self,
        event: HelpdeskEvent,
        context: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

/// Fans events out to the handler registered for their type. Unsupported
/// or unregistered types are dropped with a log line, never an error;
/// the transport still has to acknowledge them.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<HelpdeskEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, event_type: HelpdeskEventType, handler: Arc<dyn EventHandler>) {
        self.handlers.insert(event_type, handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub async fn dispatch(
        &self,
        event: HelpdeskEvent,
        context: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let Some(event_type) = event.event_type() else {
            if let HelpdeskEvent::Unsupported { event_type } = &event {
                debug!(
                    event_type = %event_type,
                    correlation_id = %context.correlation_id,
                    "dropping unsupported event"
                );
            }
            return Ok(HandlerResult::Ignored);
        };

        match self.handlers.get(&event_type) {
            Some(handler) => handler.handle(event, context).await,
            None => {
                warn!(
                    event_type = ?event_type,
                    correlation_id = %context.correlation_id,
                    "no handler registered for event type"
                );
                Ok(HandlerResult::Ignored)
            }
        }
    }
}

/// Verifies the slash-command token before routing. A mismatch is a
/// dropped request, not an error reply, so probes learn nothing.
pub struct SlashCommandHandler<S: HelpdeskCommandService> {
    router: CommandRouter<S>,
    verification_token: SecretString,
}

impl<S: HelpdeskCommandService> SlashCommandHandler<S> {
    pub fn new(router: CommandRouter<S>, verification_token: SecretString) -> Self {
        Self { router, verification_token }
    }
}

#[async_trait]
impl<S: HelpdeskCommandService> EventHandler for SlashCommandHandler<S> {
    async fn handle(
        &self,
        event: HelpdeskEvent,
        context: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let HelpdeskEvent::SlashCommand(payload) = event else {
            return Ok(HandlerResult::Ignored);
        };

        if payload.verification_token != self.verification_token.expose_secret() {
            warn!(
                team_id = %payload.team_id.0,
                correlation_id = %context.correlation_id,
                "slash command with wrong verification token dropped"
            );
            return Ok(HandlerResult::Ignored);
        }

        let reply = self.router.route(&payload).await?;
        Ok(HandlerResult::Responded(reply))
    }
}

pub struct InteractiveCallbackHandler {
    router: CallbackRouter,
}

impl InteractiveCallbackHandler {
    pub fn new(router: CallbackRouter) -> Self {
        Self { router }
    }
}

#[async_trait]
impl EventHandler for InteractiveCallbackHandler {
    async fn handle(
        &self,
        event: HelpdeskEvent,
        _context: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let HelpdeskEvent::InteractiveCallback(callback) = event else {
            return Ok(HandlerResult::Ignored);
        };

        match self.router.handle(callback).await? {
            CallbackOutcome::Reply(reply) => Ok(HandlerResult::Responded(reply)),
            CallbackOutcome::ReplaceOriginal(reply) => Ok(HandlerResult::Replaced(reply)),
            CallbackOutcome::Silent => Ok(HandlerResult::Processed),
        }
    }
}

/// Opens the realtime session for a freshly provisioned bot, marks the
/// team record as connected and greets the workspace. A team that is
/// already tracked gets no second session and no second greeting.
pub struct BotProvisionedHandler {
    store: Arc<dyn TeamStore>,
    connector: Arc<dyn RealtimeConnector>,
    registry: Arc<ConnectionRegistry>,
}

impl BotProvisionedHandler {
    pub fn new(
        store: Arc<dyn TeamStore>,
        connector: Arc<dyn RealtimeConnector>,
        registry: Arc<ConnectionRegistry>,
    ) -> Self {
        Self { store, connector, registry }
    }
}

#[async_trait]
impl EventHandler for BotProvisionedHandler {
    async fn handle(
        &self,
        event: HelpdeskEvent,
        context: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let HelpdeskEvent::BotProvisioned(event) = event else {
            return Ok(HandlerResult::Ignored);
        };

        if self.registry.is_tracked(&event.team_id).await {
            debug!(team_id = %event.team_id.0, "bot already connected, skipping");
            return Ok(HandlerResult::Processed);
        }

        if let Err(error) = self.connector.connect(&event.team_id).await {
            warn!(
                team_id = %event.team_id.0,
                correlation_id = %context.correlation_id,
                error = %error,
                "could not open realtime session for new bot"
            );
            return Ok(HandlerResult::Processed);
        }
        self.registry.track(&event.team_id).await;

        let mut team = match self.store.get(&event.team_id).await {
            Ok(Some(team)) => team,
            Ok(None) => Team::shell(event.team_id.clone()),
            Err(error) => {
                warn!(team_id = %event.team_id.0, error = %error, "team lookup failed, using empty record");
                Team::shell(event.team_id.clone())
            }
        };
        team.bot_connected = true;
        if let Err(error) = self.store.save(team).await {
            warn!(team_id = %event.team_id.0, error = %error, "failed to persist team record");
        }

        info!(
            team_id = %event.team_id.0,
            created_by = %event.created_by,
            "bot provisioned and connected"
        );
        Ok(HandlerResult::Responded(welcome_reply()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use secrecy::SecretString;

    use helpdevil_core::TeamId;
    use helpdevil_store::{InMemoryTeamStore, TeamStore};

    use super::{
        BotProvisionedEvent, BotProvisionedHandler, EventContext, EventDispatcher, HandlerResult,
        HelpdeskEvent, HelpdeskEventType, SlashCommandHandler,
    };
    use crate::commands::{CommandRouter, SlashCommandPayload, StoreBackedHelpdeskService};
    use crate::connections::{ConnectionRegistry, NoopRealtimeConnector};

    fn command_payload(text: &str, token: &str) -> SlashCommandPayload {
        SlashCommandPayload {
            command: "/helpdevil".to_string(),
            text: text.to_string(),
            team_id: TeamId("T1".to_string()),
            team_domain: None,
            channel_id: "C1".to_string(),
            user_id: "U1".to_string(),
            trigger_ts: "1730000000.0001".to_string(),
            verification_token: token.to_string(),
            request_id: "req-1".to_string(),
        }
    }

    fn slash_handler(store: Arc<InMemoryTeamStore>, token: &str) -> SlashCommandHandler<StoreBackedHelpdeskService> {
        SlashCommandHandler::new(
            CommandRouter::new(Arc::new(StoreBackedHelpdeskService::new(store))),
            SecretString::from(token.to_string()),
        )
    }

    #[tokio::test]
    async fn dispatcher_routes_to_the_registered_handler() {
        let store = Arc::new(InMemoryTeamStore::new());
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(
            HelpdeskEventType::SlashCommand,
            Arc::new(slash_handler(store, "tok")),
        );
        assert_eq!(dispatcher.handler_count(), 1);

        let result = dispatcher
            .dispatch(
                HelpdeskEvent::SlashCommand(command_payload("help", "tok")),
                &EventContext::default(),
            )
            .await
            .expect("dispatch");

        let HandlerResult::Responded(reply) = result else {
            panic!("expected a response, got {result:?}");
        };
        assert!(reply.text.contains("/helpdevil list"));
    }

    #[tokio::test]
    async fn unsupported_and_unregistered_events_are_ignored() {
        let dispatcher = EventDispatcher::new();

        let unsupported = dispatcher
            .dispatch(
                HelpdeskEvent::Unsupported { event_type: "reaction_added".to_string() },
                &EventContext::default(),
            )
            .await
            .expect("dispatch unsupported");
        assert_eq!(unsupported, HandlerResult::Ignored);

        let unregistered = dispatcher
            .dispatch(
                HelpdeskEvent::SlashCommand(command_payload("help", "tok")),
                &EventContext::default(),
            )
            .await
            .expect("dispatch unregistered");
        assert_eq!(unregistered, HandlerResult::Ignored);
    }

    #[tokio::test]
    async fn wrong_verification_token_drops_the_command() {
        let store = Arc::new(InMemoryTeamStore::new());
        let handler = slash_handler(store.clone(), "tok");

        let result = super::EventHandler::handle(
            &handler,
            HelpdeskEvent::SlashCommand(command_payload("add Guitar > music", "wrong")),
            &EventContext::default(),
        )
        .await
        .expect("handle");

        assert_eq!(result, HandlerResult::Ignored);
        assert_eq!(store.get(&TeamId("T1".to_string())).await.expect("get"), None);
    }

    #[tokio::test]
    async fn bot_provision_connects_once_and_greets_once() {
        let store = Arc::new(InMemoryTeamStore::new());
        let registry = Arc::new(ConnectionRegistry::new());
        let handler = BotProvisionedHandler::new(
            store.clone(),
            Arc::new(NoopRealtimeConnector),
            registry.clone(),
        );

        let event = HelpdeskEvent::BotProvisioned(BotProvisionedEvent {
            team_id: TeamId("T1".to_string()),
            created_by: "U1".to_string(),
        });

        let first = super::EventHandler::handle(&handler, event.clone(), &EventContext::default())
            .await
            .expect("first provision");
        let HandlerResult::Responded(reply) = first else {
            panic!("expected a greeting, got {first:?}");
        };
        assert!(reply.text.contains("/invite"));

        let team = store.get(&TeamId("T1".to_string())).await.expect("get").expect("team");
        assert!(team.bot_connected);
        assert_eq!(registry.tracked_count().await, 1);

        let second = super::EventHandler::handle(&handler, event, &EventContext::default())
            .await
            .expect("second provision");
        assert_eq!(second, HandlerResult::Processed);
        assert_eq!(registry.tracked_count().await, 1);
    }
}
