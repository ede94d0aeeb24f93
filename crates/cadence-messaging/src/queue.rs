use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{MessagingError, Result};

/// A message travelling through a work queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    /// Identifier the consumer must acknowledge.
    pub id: String,
    pub payload: Value,
}

struct QueueSlot {
    tx: mpsc::UnboundedSender<QueueMessage>,
    /// Taken by the single consumer of the queue.
    rx: Mutex<Option<mpsc::UnboundedReceiver<QueueMessage>>>,
}

struct InFlight {
    queue: String,
    message: QueueMessage,
    delivered_at: Instant,
}

/// Named work queues with at-least-once delivery.
///
/// Every enqueued message stays in flight until it is acknowledged; messages
/// left unacknowledged for too long are handed to the consumer again by
/// [`Queues::redeliver_older_than`]. Cheap to clone: all clones share state.
#[derive(Clone, Default)]
pub struct Queues {
    queues: Arc<DashMap<String, QueueSlot>>,
    in_flight: Arc<DashMap<String, InFlight>>,
}

impl Queues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the queue if it does not exist yet.
    pub fn declare(&self, name: &str) {
        self.queues.entry(name.to_string()).or_insert_with(|| {
            info!(queue = %name, "queue declared");
            let (tx, rx) = mpsc::unbounded_channel();
            QueueSlot {
                tx,
                rx: Mutex::new(Some(rx)),
            }
        });
    }

    /// Append a message to `name`. Returns the message id.
    pub fn enqueue(&self, name: &str, payload: Value) -> Result<String> {
        let slot = self
            .queues
            .get(name)
            .ok_or_else(|| MessagingError::QueueNotFound {
                name: name.to_string(),
            })?;

        let message = QueueMessage {
            id: Uuid::new_v4().to_string(),
            payload,
        };
        let id = message.id.clone();

        self.in_flight.insert(
            id.clone(),
            InFlight {
                queue: name.to_string(),
                message: message.clone(),
                delivered_at: Instant::now(),
            },
        );
        if slot.tx.send(message).is_err() {
            self.in_flight.remove(&id);
            return Err(MessagingError::Closed {
                name: name.to_string(),
            });
        }
        debug!(queue = %name, message_id = %id, "message enqueued");
        Ok(id)
    }

    /// Take the receiving end of `name`. Each queue has exactly one consumer.
    pub fn consume(&self, name: &str) -> Result<mpsc::UnboundedReceiver<QueueMessage>> {
        let slot = self
            .queues
            .get(name)
            .ok_or_else(|| MessagingError::QueueNotFound {
                name: name.to_string(),
            })?;
        let rx = slot
            .rx
            .lock()
            .expect("queue receiver poisoned")
            .take()
            .ok_or_else(|| MessagingError::AlreadyConsumed {
                name: name.to_string(),
            })?;
        Ok(rx)
    }

    /// Confirm consumption of message `id`; it will not be delivered again.
    pub fn ack(&self, id: &str) -> Result<()> {
        match self.in_flight.remove(id) {
            Some((_, entry)) => {
                debug!(queue = %entry.queue, message_id = %id, "message acknowledged");
                Ok(())
            }
            None => Err(MessagingError::UnknownMessage { id: id.to_string() }),
        }
    }

    /// Number of delivered but unacknowledged messages.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Deliver again every message left unacknowledged for at least `age`.
    /// Returns how many messages were redelivered.
    pub fn redeliver_older_than(&self, age: Duration) -> usize {
        let mut redelivered = 0;
        for mut entry in self.in_flight.iter_mut() {
            if entry.delivered_at.elapsed() < age {
                continue;
            }
            let Some(slot) = self.queues.get(&entry.queue) else {
                continue;
            };
            if slot.tx.send(entry.message.clone()).is_err() {
                warn!(queue = %entry.queue, message_id = %entry.key(), "redelivery failed: queue closed");
                continue;
            }
            entry.delivered_at = Instant::now();
            redelivered += 1;
        }
        if redelivered > 0 {
            warn!(count = redelivered, "unacknowledged messages redelivered");
        }
        redelivered
    }
}
