//! Publishing domain events and entities onto queues.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::debug;

use super::error::QueueError;
use super::queue::Queue;
use crate::domain::{Event, EventBody};

/// Errors while publishing.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The value couldn't be serialized
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    /// The queue rejected the message
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Serializes values as JSON and publishes them to one queue.
#[derive(Clone)]
pub struct EventPublisher {
    queue: Arc<dyn Queue>,
}

impl EventPublisher {
    pub fn new(queue: Arc<dyn Queue>) -> Self {
        Self { queue }
    }

    /// Publish any serializable value as one message.
    pub async fn publish_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(value)?;
        self.queue.publish(payload).await?;
        Ok(())
    }

    /// Wrap `body` in an envelope stamped now and publish it.
    pub async fn publish(&self, body: &EventBody) -> Result<Event, PublishError> {
        let event = Event::new(body, Utc::now())?;
        self.publish_json(&event).await?;
        debug!(queue = self.queue.name(), event_type = ?event.event_type, "Published event");
        Ok(event)
    }
}
