//! Durable queue contract.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::error::QueueError;

/// A message handed to a consumer, awaiting acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub receipt: u64,
    pub payload: Vec<u8>,
}

/// A named FIFO of opaque payloads with at-least-once delivery.
///
/// Redelivery of unacknowledged messages is the broker's business; this
/// contract only covers publish, pull and ack.
#[async_trait]
pub trait Queue: Send + Sync {
    fn name(&self) -> &str;

    async fn publish(&self, payload: Vec<u8>) -> Result<(), QueueError>;

    /// Wait up to `timeout` for messages and take at most `max` of them.
    ///
    /// Returns an empty batch when nothing arrived in time.
    async fn pull(&self, max: usize, timeout: Duration) -> Result<Vec<Delivery>, QueueError>;

    /// Acknowledge every receipt of a batch at once.
    async fn ack(&self, receipts: &[u64]) -> Result<(), QueueError>;
}

/// Opens queues by name over one broker connection.
#[async_trait]
pub trait QueueBroker: Send + Sync {
    async fn open_queue(&self, name: &str) -> Result<Arc<dyn Queue>, QueueError>;
}
