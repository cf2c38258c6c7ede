//! Batch consumer pool.
//!
//! A fixed number of workers pull bounded batches from one queue. Each
//! worker processes its whole batch, then acknowledges it in one call.
//! A batch the consumer rejects is left unacknowledged for the broker to
//! redeliver. A failed acknowledgment stops the pool: partial redelivery
//! bookkeeping is left to the broker, so the process must exit and be
//! restarted.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::error::{BatchError, ConsumerError};
use super::memory::MemoryQueue;
use super::queue::Queue;
use crate::domain::Event;

/// Processes the payloads of one batch.
///
/// Payload-level failures (an undecodable message) are logged and skipped
/// inside. Returning an error means the whole batch should be retried, for
/// instance because the store is unavailable; the batch is then not acked.
#[async_trait]
pub trait BatchConsumer: Send + Sync {
    async fn consume(&self, payloads: &[Vec<u8>]) -> Result<(), BatchError>;
}

/// Configuration for a consumer pool.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Queue to drain.
    pub queue_name: String,
    /// Number of independent workers.
    pub workers: usize,
    /// Maximum messages per batch.
    pub batch_size: usize,
    /// How long a pull waits for messages before polling again.
    pub poll_timeout: Duration,
}

impl ConsumerConfig {
    pub fn new(queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            ..Self::default()
        }
    }

    pub fn with_workers(mut self, n: usize) -> Self {
        self.workers = n;
        self
    }

    pub fn with_batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            queue_name: "events-queue".to_string(),
            workers: 5,
            batch_size: 20,
            poll_timeout: Duration::from_secs(2),
        }
    }
}

/// Signals a running pool to stop taking new batches.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Stop pulling new batches; in-flight batches still finish and ack.
    pub fn stop_accepting(&self) {
        self.tx.send_replace(true);
    }
}

/// A running set of consumer workers.
pub struct ConsumerPool {
    shutdown: ShutdownHandle,
    workers: JoinSet<Result<(), ConsumerError>>,
}

impl ConsumerPool {
    /// Spawn `config.workers` workers draining `queue` into `consumer`.
    pub fn start(
        queue: Arc<dyn Queue>,
        consumer: Arc<dyn BatchConsumer>,
        config: &ConsumerConfig,
    ) -> Self {
        let (tx, rx) = watch::channel(false);
        let mut workers = JoinSet::new();

        for id in 0..config.workers.max(1) {
            let worker = Worker {
                id,
                queue: queue.clone(),
                consumer: consumer.clone(),
                batch_size: config.batch_size.max(1),
                poll_timeout: config.poll_timeout,
                shutdown: rx.clone(),
            };
            workers.spawn(worker.run());
        }

        info!(
            queue = %config.queue_name,
            workers = config.workers.max(1),
            batch_size = config.batch_size,
            "Started consumer pool"
        );

        Self {
            shutdown: ShutdownHandle { tx: Arc::new(tx) },
            workers,
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Wait for every worker to finish.
    ///
    /// Returns as soon as any worker fails; the remaining workers are
    /// aborted when the pool is dropped.
    pub async fn wait(mut self) -> Result<(), ConsumerError> {
        while let Some(joined) = self.workers.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(error = %e, "Consumer worker failed");
                    return Err(e);
                }
                Err(e) => return Err(ConsumerError::Worker(e.to_string())),
            }
        }
        Ok(())
    }
}

/// How often [`drain`] checks whether its queue has emptied.
const DRAIN_POLL: Duration = Duration::from_millis(20);

/// Run `consumer` over an in-memory `queue` until nothing is left to pull,
/// then let in-flight batches finish.
///
/// Returns how many messages were left unacknowledged (rejected batches).
pub async fn drain(
    queue: Arc<MemoryQueue>,
    consumer: Arc<dyn BatchConsumer>,
    config: &ConsumerConfig,
) -> Result<usize, ConsumerError> {
    let pool = ConsumerPool::start(queue.clone(), consumer, config);
    while queue.ready_count().await > 0 {
        tokio::time::sleep(DRAIN_POLL).await;
    }
    pool.shutdown_handle().stop_accepting();
    pool.wait().await?;

    let stranded = queue.unacked_count().await;
    if stranded > 0 {
        warn!(queue = %config.queue_name, stranded, "Messages left unacknowledged");
    }
    Ok(stranded)
}

struct Worker {
    id: usize,
    queue: Arc<dyn Queue>,
    consumer: Arc<dyn BatchConsumer>,
    batch_size: usize,
    poll_timeout: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Worker {
    async fn run(mut self) -> Result<(), ConsumerError> {
        loop {
            if *self.shutdown.borrow() {
                debug!(worker = self.id, "Consumer worker stopping");
                return Ok(());
            }

            let batch = tokio::select! {
                pulled = self.queue.pull(self.batch_size, self.poll_timeout) => {
                    pulled.map_err(ConsumerError::Pull)?
                }
                _ = self.shutdown.changed() => continue,
            };

            if batch.is_empty() {
                continue;
            }

            let (receipts, payloads): (Vec<u64>, Vec<Vec<u8>>) =
                batch.into_iter().map(|d| (d.receipt, d.payload)).unzip();

            if let Err(e) = self.consumer.consume(&payloads).await {
                warn!(worker = self.id, count = receipts.len(), error = %e, "Batch left unacknowledged");
                continue;
            }

            self.queue
                .ack(&receipts)
                .await
                .map_err(ConsumerError::Ack)?;

            debug!(worker = self.id, count = receipts.len(), "Acknowledged batch");
        }
    }
}

/// Default consumer for the events queue: decodes and logs each event.
#[derive(Debug, Default)]
pub struct EventsLogger;

#[async_trait]
impl BatchConsumer for EventsLogger {
    async fn consume(&self, payloads: &[Vec<u8>]) -> Result<(), BatchError> {
        for payload in payloads {
            let event: Event = match serde_json::from_slice(payload) {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "Skipping undecodable event");
                    continue;
                }
            };

            match event.decode_body() {
                Ok(body) => info!(
                    event_type = ?event.event_type,
                    timestamp = %event.timestamp,
                    body = ?body,
                    "Received event"
                ),
                Err(e) => warn!(event_type = ?event.event_type, error = %e, "Event body does not match its type"),
            }
        }
        Ok(())
    }
}
