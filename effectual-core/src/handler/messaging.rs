//! Messaging family: broker publish, consume, ack, and nack

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::MessageEnvelope;
use crate::effect::Effect;
use crate::error::{Error, MessagingFault};
use crate::handler::HandlerContract;
use crate::outcome::Outcome;
use crate::reply::Reply;

/// Result of waiting on a subscription.
///
/// An empty wait is an expected state: delivery is at-least-once and slow
/// topics are normal, so a timeout is never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsumeOutcome {
    /// The broker delivered a message within the wait window
    Delivered(MessageEnvelope),
    /// The wait window elapsed without a delivery
    TimedOut,
}

/// Backend broker the embedder supplies for messaging effects.
///
/// Fault classification is an explicit code on [`MessagingFault`], decided by
/// the port from backend error codes, never from message text. Within one
/// subscription the port must hand out messages in the broker's delivery
/// order.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    /// Publish a payload, returning the broker-assigned message id
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        properties: &BTreeMap<String, String>,
    ) -> Result<String, MessagingFault>;

    /// Wait up to `timeout_ms` for the next message on a subscription
    async fn consume(
        &self,
        subscription: &str,
        timeout_ms: u32,
    ) -> Result<ConsumeOutcome, MessagingFault>;

    /// Acknowledge a delivered message
    async fn acknowledge(&self, message_id: &str) -> Result<(), MessagingFault>;

    /// Reject a delivered message; the broker redelivers no earlier than
    /// `delay_ms` after this call
    async fn negative_acknowledge(
        &self,
        message_id: &str,
        delay_ms: u32,
    ) -> Result<(), MessagingFault>;
}

/// Specialized handler for the messaging family.
pub struct MessagingHandler<P> {
    port: P,
}

impl<P> MessagingHandler<P> {
    const DISPATCHER_NAME: &'static str = "MessagingHandler";

    /// Wrap a broker port
    pub fn new(port: P) -> Self {
        Self { port }
    }
}

#[async_trait]
impl<P: MessagingPort> HandlerContract for MessagingHandler<P> {
    async fn handle(&self, effect: Effect) -> Outcome<Reply, Error> {
        match effect {
            Effect::PublishMessage {
                ref topic,
                ref payload,
                ref properties,
            } => {
                let published = self.port.publish(topic, payload, properties).await;
                match published {
                    Ok(id) => Outcome::Ok(Reply::MessageIdString { id }),
                    Err(fault) => {
                        tracing::warn!(
                            kind = %fault.kind,
                            retryable = fault.is_retryable(),
                            "publish failed: {}", fault.message
                        );
                        Outcome::Err(Error::Messaging { effect, fault })
                    }
                }
            }
            Effect::ConsumeMessage {
                ref subscription,
                timeout_ms,
            } => {
                let consumed = self.port.consume(subscription, timeout_ms).await;
                match consumed {
                    Ok(ConsumeOutcome::Delivered(envelope)) => {
                        Outcome::Ok(Reply::MessageEnvelope(envelope))
                    }
                    Ok(ConsumeOutcome::TimedOut) => Outcome::Ok(Reply::MessageTimeout),
                    Err(fault) => {
                        tracing::warn!(
                            kind = %fault.kind,
                            retryable = fault.is_retryable(),
                            "consume failed: {}", fault.message
                        );
                        Outcome::Err(Error::Messaging { effect, fault })
                    }
                }
            }
            Effect::AcknowledgeMessage { ref message_id } => {
                let acked = self.port.acknowledge(message_id).await;
                match acked {
                    Ok(()) => Outcome::Ok(Reply::Unit),
                    Err(fault) => Outcome::Err(Error::Messaging { effect, fault }),
                }
            }
            Effect::NegativeAcknowledge {
                ref message_id,
                delay_ms,
            } => {
                let nacked = self.port.negative_acknowledge(message_id, delay_ms).await;
                match nacked {
                    Ok(()) => Outcome::Ok(Reply::Unit),
                    Err(fault) => Outcome::Err(Error::Messaging { effect, fault }),
                }
            }
            other => Outcome::Err(Error::Unhandled {
                effect: other,
                dispatcher_name: Self::DISPATCHER_NAME,
            }),
        }
    }
}
