//! Event ingestion and publishing.
//!
//! Realtime-bound entities and domain events travel as opaque JSON
//! payloads over a durable queue, drained by a pool of batch consumers.

mod consumer;
mod error;
mod memory;
mod publisher;
mod queue;

pub use consumer::{
    BatchConsumer, ConsumerConfig, ConsumerPool, EventsLogger, ShutdownHandle, drain,
};
pub use error::{BatchError, ConsumerError, QueueError};
pub use memory::{MemoryBroker, MemoryQueue};
pub use publisher::{EventPublisher, PublishError};
pub use queue::{Delivery, Queue, QueueBroker};
