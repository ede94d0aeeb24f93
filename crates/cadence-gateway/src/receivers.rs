//! Background tasks feeding the broker: the work-queue consumer, the
//! redelivery ticker and the synchronization topic receiver.

use std::sync::Arc;
use std::time::Duration;

use cadence_messaging::{Broker, CommandContext, QueueMessage};
use cadence_protocol::{natures, Command, Nature, Outcome};
use serde::Deserialize;
use serde_json::Value;
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};
use tracing::{debug, info, warn};

/// Body of a work-queue message.
/// Wire: `{ "nature": { "type": "schedules", "quality": "create" }, "payload": {...} }`
#[derive(Debug, Deserialize)]
struct QueuedJob {
    nature: Nature,
    #[serde(default)]
    payload: Value,
}

/// Consume `queue`, turning every message into a command that carries the
/// message id as its acknowledgment id. Each message runs on its own task.
pub fn spawn_queue_consumer(broker: Arc<Broker>, queue: &str) -> anyhow::Result<JoinHandle<()>> {
    let mut rx = broker.queues().consume(queue)?;
    let queue = queue.to_string();
    info!(%queue, "queue consumer started");

    Ok(tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let broker = Arc::clone(&broker);
            tokio::spawn(async move { handle_queued(&broker, message).await });
        }
        warn!(%queue, "queue closed, consumer stopped");
    }))
}

async fn handle_queued(broker: &Broker, message: QueueMessage) {
    let QueueMessage { id, payload } = message;
    let job: QueuedJob = match serde_json::from_value(payload) {
        Ok(job) => job,
        Err(e) => {
            // Redelivering a message that cannot be decoded never helps.
            warn!(message_id = %id, error = %e, "dropping undecodable queue message");
            let _ = broker.queues().ack(&id);
            return;
        }
    };

    let nature = job.nature.clone();
    let outcome = CommandContext::from_command(Command::queued(&id, job.nature, job.payload))
        .publish(broker)
        .outcome()
        .await;

    match &outcome {
        Outcome::Done { .. } => debug!(message_id = %id, %nature, "queue message served"),
        Outcome::Reject { responder, error } => {
            // Rejections are final: stop redelivery even when the command
            // failed before acknowledging.
            warn!(message_id = %id, %nature, %responder, %error, "queue message rejected");
            let _ = broker.queues().ack(&id);
        }
        Outcome::Error { responder, error } => {
            // Redelivered only when the failure came before acknowledgment.
            warn!(message_id = %id, %nature, %responder, %error, "queue message failed");
        }
    }
}

/// Every `every`, hand unacknowledged messages older than `every` back to
/// their consumer.
pub fn spawn_redelivery(broker: Arc<Broker>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            broker.queues().redeliver_older_than(every);
        }
    })
}

/// Apply every message of the synchronization topic as a
/// `schedules/synchronize` command, one at a time and in arrival order.
pub fn spawn_sync_receiver(broker: Arc<Broker>, topic: &str) -> JoinHandle<()> {
    let mut rx = broker.topics().subscribe(topic);
    let topic = topic.to_string();
    info!(%topic, "synchronization receiver started");

    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(message) => {
                    let outcome = CommandContext::new(
                        Nature::new(natures::SCHEDULES, natures::SYNCHRONIZE),
                        message,
                    )
                    .publish(&broker)
                    .outcome()
                    .await;
                    if !outcome.is_done() {
                        warn!(%topic, status = outcome.status(), responder = outcome.responder(), "synchronization not applied");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(%topic, skipped, "synchronization receiver lagged; peers may diverge");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
