use async_trait::async_trait;
use cadence_protocol::{natures, Command, Outcome};
use serde_json::json;
use tracing::{debug, warn};

use crate::{broker::Topics, queue::Queues, responder::Responder};

/// Serves the `messages` nature: queue acknowledgements and topic publishes.
///
/// - `messages/acknowledge` with payload `{ "id": "<message id>" }` confirms
///   consumption of an in-flight queue message.
/// - `messages/publish` fans its payload out on the configured topic.
pub struct MessagesResponder {
    name: String,
    topics: Topics,
    queues: Queues,
    publish_topic: String,
}

impl MessagesResponder {
    pub fn new(
        name: impl Into<String>,
        topics: Topics,
        queues: Queues,
        publish_topic: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            topics,
            queues,
            publish_topic: publish_topic.into(),
        }
    }

    fn acknowledge(&self, command: &Command) -> Outcome {
        let Some(id) = command.payload.get("id").and_then(|v| v.as_str()) else {
            return Outcome::reject(&self.name, "missing 'id' in acknowledge payload");
        };
        match self.queues.ack(id) {
            Ok(()) => Outcome::done(&self.name, json!({ "id": id })),
            Err(e) => {
                warn!(message_id = %id, error = %e, "acknowledge refused");
                Outcome::reject(&self.name, e)
            }
        }
    }

    fn publish(&self, command: Command) -> Outcome {
        let reached = self.topics.publish(&self.publish_topic, command.payload);
        debug!(topic = %self.publish_topic, subscribers = reached, "message published");
        Outcome::done(
            &self.name,
            json!({ "topic": self.publish_topic, "subscribers": reached }),
        )
    }
}

#[async_trait]
impl Responder for MessagesResponder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn respond(&self, command: Command) -> Outcome {
        match command.nature.quality() {
            natures::ACKNOWLEDGE => self.acknowledge(&command),
            natures::PUBLISH => self.publish(command),
            other => Outcome::reject(
                &self.name,
                format!("unsupported messages quality '{other}'"),
            ),
        }
    }
}
