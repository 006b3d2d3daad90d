use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::events::{EventContext, EventDispatcher, HelpdeskEnvelope};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport connect failed: {0}")]
    Connect(String),
    #[error("transport receive failed: {0}")]
    Receive(String),
    #[error("transport acknowledge failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Reconnect backoff: `base_delay_ms << attempt`, capped. Attempts reset
/// after any successful connection.
#[derive(Clone, Copy, Debug)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay = self.base_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

/// The wire side of the realtime loop. Production speaks a websocket;
/// tests script envelopes.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;

    /// Next envelope, or `None` when the stream has ended cleanly.
    async fn next_envelope(&self) -> Result<Option<HelpdeskEnvelope>, TransportError>;

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Transport that connects to nothing and delivers nothing, for
/// deployments that only exercise the command surface.
pub struct NoopRealtimeTransport;

#[async_trait]
impl RealtimeTransport for NoopRealtimeTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<HelpdeskEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _envelope_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Pumps envelopes from the transport into the dispatcher until the
/// stream ends, reconnecting with backoff on transport failures.
/// Dispatch failures are logged and never tear the connection down.
pub struct RealtimeRunner {
    transport: Arc<dyn RealtimeTransport>,
    dispatcher: Arc<EventDispatcher>,
    reconnect_policy: ReconnectPolicy,
}

impl RealtimeRunner {
    pub fn new(
        transport: Arc<dyn RealtimeTransport>,
        dispatcher: Arc<EventDispatcher>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    pub async fn start(&self) -> Result<(), RealtimeError> {
        let mut attempt: u32 = 0;
        loop {
            let error = match self.transport.connect().await {
                Ok(()) => {
                    info!("realtime transport connected");
                    attempt = 0;
                    match self.pump().await {
                        Ok(()) => {
                            info!("realtime stream ended cleanly");
                            return Ok(());
                        }
                        Err(error) => error,
                    }
                }
                Err(error) => error,
            };

            if attempt >= self.reconnect_policy.max_retries {
                warn!(error = %error, "realtime retries exhausted, giving up");
                return Err(error.into());
            }
            let delay = self.reconnect_policy.delay_for(attempt);
            warn!(
                error = %error,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "realtime connection lost, reconnecting"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn pump(&self) -> Result<(), TransportError> {
        loop {
            let envelope = match self.transport.next_envelope().await? {
                Some(envelope) => envelope,
                None => break,
            };

            // Acknowledge first so a slow handler never causes a redelivery.
            self.transport.acknowledge(&envelope.envelope_id).await?;

            let context = EventContext {
                correlation_id: envelope
                    .event
                    .team_id()
                    .unwrap_or("unknown-correlation-id")
                    .to_string(),
            };
            match self.dispatcher.dispatch(envelope.event, &context).await {
                Ok(result) => {
                    debug!(
                        envelope_id = %envelope.envelope_id,
                        result = ?result,
                        "envelope dispatched"
                    );
                }
                Err(error) => {
                    warn!(
                        envelope_id = %envelope.envelope_id,
                        error = %error,
                        "handler failed, envelope dropped"
                    );
                }
            }
        }

        self.transport.disconnect().await?;
        Ok(())
    }
}
