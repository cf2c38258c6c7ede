//! Queue and consumer error types.

/// Errors from a queue backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueueError {
    /// The queue no longer accepts operations
    #[error("queue {0} is closed")]
    Closed(String),

    /// Ack for a delivery the queue doesn't hold
    #[error("unknown delivery receipt {0}")]
    UnknownReceipt(u64),

    /// Backend-specific failure
    #[error("queue backend error: {message}")]
    Backend { message: String },
}

/// A batch that couldn't be processed and must not be acknowledged.
///
/// The worker leaves the batch unacked so the broker redelivers it.
#[derive(Debug, Clone, thiserror::Error)]
#[error("batch not processed: {message}")]
pub struct BatchError {
    pub message: String,
}

impl BatchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors that stop a consumer worker.
#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    /// Acknowledging a processed batch failed; the worker can't continue
    #[error("failed to acknowledge batch: {0}")]
    Ack(#[source] QueueError),

    /// Pulling the next batch failed
    #[error("failed to pull batch: {0}")]
    Pull(#[source] QueueError),

    /// A worker task panicked or was aborted
    #[error("consumer worker stopped unexpectedly: {0}")]
    Worker(String),
}
