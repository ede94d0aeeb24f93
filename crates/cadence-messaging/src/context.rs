//! Command Context: one outbound intent paired with exactly one eventual
//! outcome.
//!
//! Lifecycle:
//!
//! ```text
//! CommandContext::new ──publish──▶ Pending ──outcome().await──▶ Outcome
//!     (CREATED)                  (DISPATCHED)         (DONE | REJECTED | ERRORED)
//! ```
//!
//! The responder side holds a [`Reply`], which is consumed by sending, so a
//! second terminal signal cannot be expressed. A reply dropped without
//! sending, or a responder that never answers within the timeout, resolves
//! the pending side with a synthetic `error` outcome.

use std::time::Duration;

use cadence_protocol::{Command, Nature, Outcome};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::broker::Broker;

/// Responder name of the synthetic outcome produced on timeout.
pub const TIMEOUT_RESPONDER: &str = "timeout";
/// Responder name of the synthetic outcome produced when a reply is dropped.
pub const BROKER_RESPONDER: &str = "broker";

/// A command that has been created but not yet dispatched.
#[derive(Debug)]
pub struct CommandContext {
    command: Command,
    timeout: Option<Duration>,
}

impl CommandContext {
    pub fn new(nature: Nature, payload: Value) -> Self {
        Self::from_command(Command::direct(nature, payload))
    }

    pub fn from_command(command: Command) -> Self {
        Self {
            command,
            timeout: None,
        }
    }

    /// Override the broker's default timeout for this context only.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn nature(&self) -> &Nature {
        &self.command.nature
    }

    pub fn payload(&self) -> &Value {
        &self.command.payload
    }

    /// Hand the context to the broker. Never blocks; the outcome is awaited
    /// through the returned [`Pending`].
    pub fn publish(self, broker: &Broker) -> Pending {
        let (tx, rx) = oneshot::channel();
        let nature = self.command.nature.clone();
        let timeout = self.timeout.or_else(|| broker.command_timeout());
        debug!(%nature, "publishing command");
        broker.dispatch(Delivery {
            command: self.command,
            reply: Reply { tx },
        });
        Pending {
            nature,
            rx,
            timeout,
        }
    }
}

/// A dispatched command and the handle its responder answers through.
pub struct Delivery {
    pub command: Command,
    pub reply: Reply,
}

/// Single-use answer channel. Sending consumes it.
pub struct Reply {
    tx: oneshot::Sender<Outcome>,
}

impl Reply {
    pub fn send(self, outcome: Outcome) {
        if self.tx.send(outcome).is_err() {
            // Creator stopped waiting (timed out or was torn down).
            debug!("outcome discarded: no one is waiting for it");
        }
    }
}

/// A dispatched command awaiting its terminal signal.
#[derive(Debug)]
pub struct Pending {
    nature: Nature,
    rx: oneshot::Receiver<Outcome>,
    timeout: Option<Duration>,
}

impl Pending {
    pub fn nature(&self) -> &Nature {
        &self.nature
    }

    /// Wait for the single outcome of the command.
    pub async fn outcome(self) -> Outcome {
        let Pending {
            nature,
            rx,
            timeout,
        } = self;

        let received = match timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    let ms = limit.as_millis() as u64;
                    warn!(%nature, timeout_ms = ms, "command timed out without an outcome");
                    return Outcome::error(
                        TIMEOUT_RESPONDER,
                        format!("no outcome for {nature} within {ms}ms"),
                    );
                }
            },
            None => rx.await,
        };

        received.unwrap_or_else(|_| {
            warn!(%nature, "responder dropped the command without an outcome");
            Outcome::error(
                BROKER_RESPONDER,
                format!("responder for {nature} dropped the command"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pending(timeout: Option<Duration>) -> (Reply, Pending) {
        let (tx, rx) = oneshot::channel();
        let pending = Pending {
            nature: Nature::new("svc", "op"),
            rx,
            timeout,
        };
        (Reply { tx }, pending)
    }

    #[tokio::test]
    async fn reply_resolves_pending_once() {
        let (reply, pending) = pending(None);
        reply.send(Outcome::done("svc", json!({"ok": true})));
        assert_eq!(pending.outcome().await, Outcome::done("svc", json!({"ok": true})));
    }

    #[tokio::test]
    async fn dropped_reply_is_an_error_from_the_broker() {
        let (reply, pending) = pending(None);
        drop(reply);

        let outcome = pending.outcome().await;
        assert_eq!(outcome.status(), "error");
        assert_eq!(outcome.responder(), BROKER_RESPONDER);
    }

    #[tokio::test]
    async fn late_reply_after_timeout_is_discarded() {
        let (reply, pending) = pending(Some(Duration::from_millis(10)));
        let outcome = pending.outcome().await;
        assert_eq!(outcome.responder(), TIMEOUT_RESPONDER);

        // receiver is gone; sending must not panic
        reply.send(Outcome::done("svc", json!(null)));
    }

    #[tokio::test]
    async fn context_timeout_overrides_broker_default() {
        let broker = Broker::new(None);
        let context = CommandContext::new(Nature::new("svc", "op"), json!({}))
            .with_timeout(Duration::from_millis(5));
        assert_eq!(context.nature().quality(), "op");

        // unrouted natures answer immediately, before any timeout
        let pending = context.publish(&broker);
        assert_eq!(pending.timeout, Some(Duration::from_millis(5)));
        assert_eq!(pending.outcome().await.responder(), BROKER_RESPONDER);
    }
}
