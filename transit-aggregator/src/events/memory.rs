//! In-process queue broker.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use super::error::QueueError;
use super::queue::{Delivery, Queue, QueueBroker};

#[derive(Default)]
struct QueueState {
    next_receipt: u64,
    ready: VecDeque<Delivery>,
    unacked: HashMap<u64, Vec<u8>>,
    closed: bool,
}

/// Queue held in memory, with receipts and explicit acknowledgment.
pub struct MemoryQueue {
    name: String,
    state: Mutex<QueueState>,
    arrivals: Notify,
}

impl MemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(QueueState::default()),
            arrivals: Notify::new(),
        }
    }

    /// Messages waiting to be pulled.
    pub async fn ready_count(&self) -> usize {
        self.state.lock().await.ready.len()
    }

    /// Messages pulled but not yet acknowledged.
    pub async fn unacked_count(&self) -> usize {
        self.state.lock().await.unacked.len()
    }

    /// Return every unacknowledged message to the front of the queue.
    ///
    /// Stands in for the broker's redelivery of batches abandoned by a
    /// terminated consumer.
    pub async fn redeliver_unacked(&self) -> usize {
        let mut state = self.state.lock().await;
        let mut pending: Vec<(u64, Vec<u8>)> = state.unacked.drain().collect();
        pending.sort_by_key(|(receipt, _)| *receipt);
        let count = pending.len();

        for (receipt, payload) in pending.into_iter().rev() {
            state.ready.push_front(Delivery { receipt, payload });
        }
        drop(state);

        if count > 0 {
            self.arrivals.notify_waiters();
        }
        count
    }

    /// Stop accepting publishes and pulls.
    pub async fn close(&self) {
        self.state.lock().await.closed = true;
        self.arrivals.notify_waiters();
    }

    async fn take(&self, max: usize) -> Result<Vec<Delivery>, QueueError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(QueueError::Closed(self.name.clone()));
        }

        let n = max.min(state.ready.len());
        let batch: Vec<Delivery> = state.ready.drain(..n).collect();
        for delivery in &batch {
            state
                .unacked
                .insert(delivery.receipt, delivery.payload.clone());
        }
        Ok(batch)
    }
}

#[async_trait]
impl Queue for MemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, payload: Vec<u8>) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(QueueError::Closed(self.name.clone()));
        }
        let receipt = state.next_receipt;
        state.next_receipt += 1;
        state.ready.push_back(Delivery { receipt, payload });
        drop(state);

        self.arrivals.notify_one();
        Ok(())
    }

    async fn pull(&self, max: usize, timeout: Duration) -> Result<Vec<Delivery>, QueueError> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            // Register interest before checking, so a publish in between isn't missed.
            let notified = self.arrivals.notified();
            let batch = self.take(max).await?;
            if !batch.is_empty() {
                return Ok(batch);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn ack(&self, receipts: &[u64]) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        if let Some(missing) = receipts.iter().find(|r| !state.unacked.contains_key(r)) {
            return Err(QueueError::UnknownReceipt(*missing));
        }
        for receipt in receipts {
            state.unacked.remove(receipt);
        }
        Ok(())
    }
}

/// Broker handing out shared in-memory queues by name.
#[derive(Default)]
pub struct MemoryBroker {
    queues: Mutex<HashMap<String, Arc<MemoryQueue>>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or create) a queue, keeping the concrete type.
    pub async fn memory_queue(&self, name: &str) -> Arc<MemoryQueue> {
        let mut queues = self.queues.lock().await;
        queues
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryQueue::new(name)))
            .clone()
    }
}

#[async_trait]
impl QueueBroker for MemoryBroker {
    async fn open_queue(&self, name: &str) -> Result<Arc<dyn Queue>, QueueError> {
        let queue: Arc<dyn Queue> = self.memory_queue(name).await;
        Ok(queue)
    }
}
