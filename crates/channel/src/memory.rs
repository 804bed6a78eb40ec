use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::{ChannelError, Envelope, NotificationChannel, Subscription, Topic};

/// Process-local fan-out channel. Every subscriber of a topic receives every
/// message. `with_redelivery(n)` delivers each message `n` extra times to
/// exercise duplicate handling.
///
/// Published envelopes are only kept when the channel is built with
/// [`recording`](Self::recording); a service channel retains nothing once
/// messages are delivered.
#[derive(Debug, Default)]
pub struct InMemoryChannel {
    subscribers: RwLock<HashMap<Topic, Vec<mpsc::UnboundedSender<Envelope>>>>,
    published: Option<Mutex<Vec<Envelope>>>,
    redelivery: u32,
}

impl InMemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel that also keeps every published envelope for inspection
    pub fn recording() -> Self {
        Self {
            published: Some(Mutex::new(Vec::new())),
            ..Self::default()
        }
    }

    pub fn with_redelivery(mut self, extra_deliveries: u32) -> Self {
        self.redelivery = extra_deliveries;
        self
    }

    /// Everything published on `topic` so far, in order. Always empty unless
    /// the channel is recording.
    pub fn published(&self, topic: Topic) -> Vec<Envelope> {
        match &self.published {
            Some(published) => published
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.topic == topic)
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.subscribers
            .read()
            .unwrap()
            .get(&topic)
            .map(|subs| subs.iter().filter(|s| !s.is_closed()).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl NotificationChannel for InMemoryChannel {
    async fn publish(&self, topic: Topic, payload: serde_json::Value) -> Result<Uuid, ChannelError> {
        let envelope = Envelope {
            id: Uuid::new_v4(),
            topic,
            payload,
            published_at: Utc::now(),
            delivery_attempt: 1,
        };

        if let Some(published) = &self.published {
            published.lock().unwrap().push(envelope.clone());
        }

        let mut subscribers = self.subscribers.write().unwrap();
        let subs = subscribers.entry(topic).or_default();
        subs.retain(|s| !s.is_closed());

        for sub in subs.iter() {
            for attempt in 1..=1 + self.redelivery {
                let mut delivery = envelope.clone();
                delivery.delivery_attempt = attempt;
                if sub.send(delivery).is_err() {
                    trace!(topic = %topic, "subscriber dropped during delivery");
                    break;
                }
            }
        }

        debug!(
            topic = %topic,
            message_id = %envelope.id,
            subscribers = subs.len(),
            "published message"
        );
        Ok(envelope.id)
    }

    async fn subscribe(&self, topic: Topic) -> Result<Subscription, ChannelError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .write()
            .unwrap()
            .entry(topic)
            .or_default()
            .push(tx);
        Ok(Subscription::new(topic, rx))
    }
}
