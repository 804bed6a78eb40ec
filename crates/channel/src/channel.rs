use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("channel closed: {0}")]
    Closed(String),

    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    #[serde(rename = "orders.announced")]
    OrdersAnnounced,
    #[serde(rename = "orders.instructions")]
    EscrowInstructions,
    #[serde(rename = "orders.commitments")]
    Commitments,
    #[serde(rename = "orders.readiness")]
    Readiness,
    #[serde(rename = "orders.secrets")]
    Secrets,
    #[serde(rename = "orders.status")]
    Status,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::OrdersAnnounced => "orders.announced",
            Topic::EscrowInstructions => "orders.instructions",
            Topic::Commitments => "orders.commitments",
            Topic::Readiness => "orders.readiness",
            Topic::Secrets => "orders.secrets",
            Topic::Status => "orders.status",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A delivered message. `id` is stable across redeliveries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: Uuid,
    pub topic: Topic,
    pub payload: serde_json::Value,
    pub published_at: DateTime<Utc>,
    /// 1 for the first delivery
    pub delivery_attempt: u32,
}

impl Envelope {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ChannelError> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// Stream of envelopes for one topic
#[derive(Debug)]
pub struct Subscription {
    topic: Topic,
    receiver: mpsc::UnboundedReceiver<Envelope>,
}

impl Subscription {
    pub fn new(topic: Topic, receiver: mpsc::UnboundedReceiver<Envelope>) -> Self {
        Self { topic, receiver }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Next envelope, or `None` once the channel is gone
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.receiver.recv().await
    }

    /// Next envelope if one is already queued
    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.receiver.try_recv().ok()
    }
}

/// At-least-once publish/subscribe transport
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn publish(&self, topic: Topic, payload: serde_json::Value) -> Result<Uuid, ChannelError>;

    async fn subscribe(&self, topic: Topic) -> Result<Subscription, ChannelError>;
}

/// Typed publishing on top of any [`NotificationChannel`]
#[async_trait]
pub trait NotificationChannelExt: NotificationChannel {
    async fn publish_message<M>(&self, topic: Topic, message: &M) -> Result<Uuid, ChannelError>
    where
        M: Serialize + Sync,
    {
        let payload = serde_json::to_value(message)?;
        self.publish(topic, payload).await
    }
}

impl<C: NotificationChannel + ?Sized> NotificationChannelExt for C {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_wire_names() {
        assert_eq!(Topic::Commitments.as_str(), "orders.commitments");
        assert_eq!(
            serde_json::to_string(&Topic::OrdersAnnounced).unwrap(),
            "\"orders.announced\""
        );
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        #[derive(Debug, Deserialize)]
        struct Expected {
            #[allow(dead_code)]
            order_id: String,
        }

        let envelope = Envelope {
            id: Uuid::new_v4(),
            topic: Topic::Status,
            payload: serde_json::json!({ "unexpected": 1 }),
            published_at: Utc::now(),
            delivery_attempt: 1,
        };
        assert!(matches!(
            envelope.decode::<Expected>(),
            Err(ChannelError::Serialization(_))
        ));
    }
}
