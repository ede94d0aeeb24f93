use std::sync::Arc;
use std::time::Duration;

use cadence_protocol::{Nature, Outcome};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    context::{Delivery, BROKER_RESPONDER},
    queue::Queues,
    responder::Responder,
};

/// Messages a topic buffers per subscriber before the slowest one lags.
pub const TOPIC_CAPACITY: usize = 256;

/// Fan-out topics backed by tokio broadcast channels.
///
/// Every subscriber sees every message published after it subscribed.
/// Cheap to clone: all clones share the same topics.
#[derive(Clone, Default)]
pub struct Topics {
    topics: Arc<DashMap<String, broadcast::Sender<Value>>>,
}

impl Topics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `topic`, creating it on first use.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<Value> {
        self.sender(topic).subscribe()
    }

    /// Push `payload` to every current subscriber of `topic`.
    /// Returns the number of subscribers reached (0 if none).
    pub fn publish(&self, topic: &str, payload: Value) -> usize {
        match self.sender(topic).send(payload) {
            Ok(n) => n,
            Err(_) => {
                debug!(%topic, "published to topic without subscribers");
                0
            }
        }
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<Value> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .clone()
    }
}

/// In-process message broker.
///
/// Routes each dispatched command to the responder registered for its
/// nature (exact `type/quality` first, then `type` alone) and runs the
/// responder on its own Tokio task. Also owns the fan-out topics and work
/// queues used by the synchronization and acknowledgement protocols.
pub struct Broker {
    routes: DashMap<Nature, Arc<dyn Responder>>,
    topics: Topics,
    queues: Queues,
    command_timeout: Option<Duration>,
}

impl Broker {
    /// Create an empty broker. `command_timeout` bounds every pending context
    /// that does not set its own; `None` waits forever.
    pub fn new(command_timeout: Option<Duration>) -> Self {
        Self {
            routes: DashMap::new(),
            topics: Topics::new(),
            queues: Queues::new(),
            command_timeout,
        }
    }

    /// Register `responder` for `nature`. Replaces any previous route.
    pub fn route(&self, nature: Nature, responder: Arc<dyn Responder>) {
        info!(%nature, responder = %responder.name(), "route registered");
        self.routes.insert(nature, responder);
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    pub fn queues(&self) -> &Queues {
        &self.queues
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout
    }

    /// Hand a delivery to its responder. Never blocks: a missing route is
    /// answered immediately with an `error` outcome.
    pub fn dispatch(&self, delivery: Delivery) {
        let Delivery { command, reply } = delivery;

        let Some(responder) = self.resolve(&command.nature) else {
            warn!(nature = %command.nature, "no responder registered");
            reply.send(Outcome::error(
                BROKER_RESPONDER,
                format!("no responder for nature {}", command.nature),
            ));
            return;
        };

        tokio::spawn(async move {
            let outcome = responder.respond(command).await;
            reply.send(outcome);
        });
    }

    fn resolve(&self, nature: &Nature) -> Option<Arc<dyn Responder>> {
        if let Some(r) = self.routes.get(nature) {
            return Some(Arc::clone(r.value()));
        }
        self.routes
            .get(&Nature::of_kind(nature.kind.clone()))
            .map(|r| Arc::clone(r.value()))
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(None)
    }
}
