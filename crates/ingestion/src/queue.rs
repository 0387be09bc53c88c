//! Bounded FIFO queue between input adapters and the dispatch daemon
//!
//! Many producers, exactly one consumer. `QueueProducer` is `Clone`;
//! `QueueConsumer` is not. The number of resident messages never exceeds the
//! capacity: a full queue either suspends the producer or rejects the
//! message, as chosen by [`BackpressurePolicy`]. Nothing is dropped silently.

use async_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use chrono::Utc;
use contracts::{MetricMessage, QueueConfig};
use tracing::debug;

use crate::config::BackpressurePolicy;
use crate::error::QueueError;

/// Queue constructor
pub struct MetricQueue;

impl MetricQueue {
    /// Create a queue holding at most `capacity` messages (minimum 1)
    pub fn bounded(capacity: usize, policy: BackpressurePolicy) -> (QueueProducer, QueueConsumer) {
        let capacity = capacity.max(1);
        let (tx, rx) = bounded(capacity);

        debug!(capacity, policy = ?policy, "metric queue created");

        (
            QueueProducer {
                tx,
                policy,
                capacity,
            },
            QueueConsumer { rx, capacity },
        )
    }

    /// Create a queue from configuration
    pub fn from_config(config: &QueueConfig) -> (QueueProducer, QueueConsumer) {
        Self::bounded(config.capacity, BackpressurePolicy::from(config))
    }
}

/// Producer side, shared by every input adapter
#[derive(Debug, Clone)]
pub struct QueueProducer {
    tx: Sender<MetricMessage>,
    policy: BackpressurePolicy,
    capacity: usize,
}

impl QueueProducer {
    /// Enqueue a message according to the backpressure policy
    ///
    /// A missing timestamp is filled with the current UTC time first.
    ///
    /// # Errors
    /// - `QueueError::Full` when rejected by the `Reject`/`Timeout` policy
    /// - `QueueError::Closed` when the queue has been closed
    pub async fn enqueue(&self, message: MetricMessage) -> Result<(), QueueError> {
        let message = message.stamped(Utc::now());

        let result = match self.policy {
            BackpressurePolicy::Block => self.tx.send(message).await.map_err(|_| QueueError::Closed),
            BackpressurePolicy::Reject => self.try_send(message),
            BackpressurePolicy::Timeout(wait) => {
                match tokio::time::timeout(wait, self.tx.send(message)).await {
                    Ok(sent) => sent.map_err(|_| QueueError::Closed),
                    Err(_) => Err(QueueError::Full {
                        capacity: self.capacity,
                    }),
                }
            }
        };

        if result.is_ok() {
            observability::record_queue_depth(self.tx.len());
        }
        result
    }

    /// Enqueue without waiting, whatever the configured policy
    pub fn try_enqueue(&self, message: MetricMessage) -> Result<(), QueueError> {
        let result = self.try_send(message.stamped(Utc::now()));
        if result.is_ok() {
            observability::record_queue_depth(self.tx.len());
        }
        result
    }

    fn try_send(&self, message: MetricMessage) -> Result<(), QueueError> {
        self.tx.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => QueueError::Full {
                capacity: self.capacity,
            },
            TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    /// Resident message count
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> BackpressurePolicy {
        self.policy
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Close the queue: further enqueues fail, resident messages stay drainable
    pub fn close(&self) -> bool {
        self.tx.close()
    }
}

/// Consumer side, owned by the dispatch daemon
#[derive(Debug)]
pub struct QueueConsumer {
    rx: Receiver<MetricMessage>,
    capacity: usize,
}

impl QueueConsumer {
    /// Wait for the next message
    ///
    /// Returns `None` only once the queue is closed (explicitly or because
    /// every producer is gone) and fully drained.
    pub async fn dequeue(&self) -> Option<MetricMessage> {
        let message = self.rx.recv().await.ok();
        observability::record_queue_depth(self.rx.len());
        message
    }

    /// Wait for one message, then take up to `max` resident messages in order
    pub async fn dequeue_batch(&self, max: usize) -> Option<Vec<MetricMessage>> {
        let first = self.rx.recv().await.ok()?;
        let mut batch = Vec::with_capacity(max.clamp(1, self.capacity));
        batch.push(first);

        while batch.len() < max {
            match self.rx.try_recv() {
                Ok(message) => batch.push(message),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }

        observability::record_queue_depth(self.rx.len());
        Some(batch)
    }

    /// Take a message if one is resident
    pub fn try_dequeue(&self) -> Option<MetricMessage> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn close(&self) -> bool {
        self.rx.close()
    }
}
