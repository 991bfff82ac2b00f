use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use bookbot_core::ApplicationError;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::{
    blocks,
    events::{EventContext, EventDispatcher, HandlerResult, SlackEnvelope},
    web::MessageDelivery,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport closed by peer: {0}")]
    Closed(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
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
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// `Ok(None)` means the transport was shut down on purpose; the runner stops.
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: Arc<EventDispatcher>,
    delivery: Arc<dyn MessageDelivery>,
    reconnect_policy: ReconnectPolicy,
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        dispatcher: EventDispatcher,
        delivery: Arc<dyn MessageDelivery>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher: Arc::new(dispatcher), delivery, reconnect_policy }
    }

    /// Runs sessions until the transport ends cleanly or consecutive connect
    /// failures exceed the retry budget. A session that connected resets the budget.
    pub async fn start(&self) -> Result<()> {
        let mut failures = 0_u32;
        loop {
            let mut established = false;
            let transport_error = match self.connect_and_pump(&mut established).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => transport_error,
            };

            if established {
                failures = 0;
                info!(
                    event_name = "ingress.slack.session_dropped",
                    reason = %transport_error,
                    "socket mode session ended; reconnecting"
                );
            } else {
                failures += 1;
                warn!(
                    attempt = failures,
                    max_retries = self.reconnect_policy.max_retries,
                    error = %transport_error,
                    "socket mode transport failed"
                );

                if failures > self.reconnect_policy.max_retries {
                    warn!(
                        max_retries = self.reconnect_policy.max_retries,
                        "socket mode retries exhausted; continuing process without crash"
                    );
                    return Ok(());
                }
            }

            let delay = self.reconnect_policy.backoff(failures.saturating_sub(1));
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    async fn connect_and_pump(&self, established: &mut bool) -> Result<(), TransportError> {
        info!("opening socket mode transport connection");
        self.transport.connect().await?;
        *established = true;
        info!("socket mode transport connected");

        let mut in_flight = JoinSet::new();
        let outcome = self.pump(&mut in_flight).await;

        while let Some(joined) = in_flight.join_next().await {
            if let Err(error) = joined {
                warn!(error = %error, "envelope task did not complete");
            }
        }
        outcome
    }

    async fn pump(&self, in_flight: &mut JoinSet<()>) -> Result<(), TransportError> {
        loop {
            while let Some(joined) = in_flight.try_join_next() {
                if let Err(error) = joined {
                    warn!(error = %error, "envelope task did not complete");
                }
            }

            let envelope = match self.transport.next_envelope().await {
                Ok(Some(envelope)) => envelope,
                Ok(None) => {
                    info!("socket mode transport stream closed");
                    self.transport.disconnect().await?;
                    return Ok(());
                }
                Err(error) => {
                    if let Err(disconnect_error) = self.transport.disconnect().await {
                        debug!(error = %disconnect_error, "socket teardown after read failure");
                    }
                    return Err(error);
                }
            };

            info!(
                event_name = "ingress.slack.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %envelope.envelope_id,
                "received slack envelope"
            );

            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    error = %error,
                    "failed to acknowledge slack envelope"
                );
            } else {
                debug!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    "acknowledged slack envelope"
                );
            }

            in_flight.spawn(process_envelope(
                Arc::clone(&self.dispatcher),
                Arc::clone(&self.delivery),
                envelope,
            ));
        }
    }
}

async fn process_envelope(
    dispatcher: Arc<EventDispatcher>,
    delivery: Arc<dyn MessageDelivery>,
    envelope: SlackEnvelope,
) {
    let correlation_id = envelope.envelope_id.clone();
    let context = EventContext { correlation_id: correlation_id.clone() };

    let message = match dispatcher.dispatch(&envelope, &context).await {
        Ok(HandlerResult::Responded(message)) => message,
        Ok(HandlerResult::Ignored) => {
            debug!(correlation_id = %correlation_id, "no handler response for envelope");
            return;
        }
        Err(error) => {
            let interface = ApplicationError::from(error).into_interface(correlation_id.clone());
            warn!(
                event_name = "slack.dispatch.failed",
                correlation_id = %correlation_id,
                error = %interface,
                "event dispatch failed; replying with error card"
            );
            blocks::error_message(interface.user_message(), interface.correlation_id())
        }
    };

    let Some(response_url) = envelope.response_url() else {
        warn!(
            event_name = "slack.reply.skipped",
            correlation_id = %correlation_id,
            "envelope carried no response_url"
        );
        return;
    };

    match delivery.respond(response_url, &message).await {
        Ok(()) => debug!(
            event_name = "slack.reply.sent",
            correlation_id = %correlation_id,
            "reply delivered"
        ),
        Err(error) => {
            let error = ApplicationError::Delivery(error.to_string());
            warn!(
                event_name = "slack.reply.failed",
                correlation_id = %correlation_id,
                error = %error,
                "failed to deliver reply"
            );
        }
    }
}
