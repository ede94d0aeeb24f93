use std::sync::{Arc, Weak};

use async_trait::async_trait;
use cadence_messaging::{Broker, CommandContext, Failure, Responder};
use cadence_protocol::{natures, Command, Nature, Outcome, SyncKind, SyncMessage};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    acknowledge::acknowledge_message,
    error::{Result, ScheduleError, ValidationError},
    operation::Operation,
    synchronizer,
};

/// Serves the `schedules` nature.
///
/// Every operation runs the same pipeline, parameterized by its
/// [`Operation`] policy:
///
/// 1. validate the payload against the operation's field table
/// 2. acknowledge the queue message the command came from, if any
/// 3. dispatch one `dbinterface` command and await its outcome
/// 4. for writes with a non-null result, broadcast the entity to peers
///
/// `schedules/synchronize` applies a peer's broadcast to the local store. It
/// is never acknowledged nor broadcast again, and broadcasts carrying this
/// service's own origin are skipped: the local store already holds them.
pub struct ScheduleService {
    name: String,
    collection: String,
    /// Unique per service instance. Peers usually share `name`.
    origin: String,
    broker: Weak<Broker>,
}

impl ScheduleService {
    /// The service keeps a weak handle: the broker owns the service through
    /// its routing table.
    pub fn new(name: impl Into<String>, collection: impl Into<String>, broker: &Arc<Broker>) -> Self {
        let name = name.into();
        Self {
            origin: format!("{name}@{}", Uuid::new_v4()),
            name,
            collection: collection.into(),
            broker: Arc::downgrade(broker),
        }
    }

    /// Origin tag carried by every synchronization message this service
    /// broadcasts.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    fn broker(&self) -> std::result::Result<Arc<Broker>, Failure> {
        self.broker
            .upgrade()
            .ok_or_else(|| Failure::error(&self.name, "broker is shut down"))
    }

    async fn process(&self, op: Operation, command: &Command) -> Result<Outcome> {
        let validated = op.validate(&command.payload)?;
        let broker = self.broker()?;

        acknowledge_message(&broker, command).await?;

        let payload = op.db_payload(&self.collection, &validated)?;
        let outcome = persist(&broker, op.db_quality(), payload).await;

        // Reads pass the store's outcome through untouched.
        let Some(kind) = op.sync_kind() else {
            return Ok(outcome);
        };

        let (_, entity) = Failure::check(outcome)?;
        if entity.is_null() {
            info!(operation = %op.quality(), "no matching schedule");
            return Ok(Outcome::done(&self.name, Value::Null));
        }

        synchronizer::broadcast(&broker, &self.origin, kind, &entity).await?;
        info!(operation = %op.quality(), %kind, id = %entity["id"], "schedule written");
        Ok(Outcome::done(&self.name, entity))
    }

    /// Apply a peer's synchronization message: upsert or delete keyed by
    /// `(objId, type)` when both are present, else by `id`. Last write wins.
    async fn synchronize(&self, command: &Command) -> Result<Outcome> {
        let message: SyncMessage = serde_json::from_value(command.payload.clone())
            .map_err(|e| ValidationError::field("payload", e.to_string()))?;
        if message.origin.as_deref() == Some(self.origin.as_str()) {
            debug!(kind = %message.operation_kind, "own broadcast skipped");
            return Ok(Outcome::done(&self.name, Value::Null));
        }
        let entity = message
            .entity
            .as_object()
            .ok_or(ValidationError::MissingPayload)?;

        let collection = &self.collection;
        let id = entity.get("id").cloned().unwrap_or(Value::Null);
        let key = entity
            .get("objId")
            .and_then(Value::as_str)
            .zip(entity.get("type").and_then(Value::as_str));

        let (quality, payload) = match (message.operation_kind, key) {
            (SyncKind::Delete, Some((obj_id, obj_type))) => (
                natures::DB_DELETE_ONE_BY_OBJ_ID_TYPE,
                json!({ "collection": collection, "objId": obj_id, "type": obj_type }),
            ),
            (SyncKind::Delete, None) => (
                natures::DB_DELETE_ONE,
                json!({ "collection": collection, "id": id }),
            ),
            (_, Some((obj_id, obj_type))) => {
                let mut content = entity.clone();
                for key in ["id", "objId", "type"] {
                    content.remove(key);
                }
                (
                    natures::DB_UPSERT_ONE_BY_OBJ_ID_TYPE,
                    json!({
                        "collection": collection,
                        "id": id,
                        "objId": obj_id,
                        "type": obj_type,
                        "content": content,
                    }),
                )
            }
            (_, None) => (
                natures::DB_INSERT_ONE,
                json!({ "collection": collection, "content": entity }),
            ),
        };

        let broker = self.broker()?;
        let outcome = persist(&broker, quality, payload).await;
        info!(
            kind = %message.operation_kind,
            id = %id,
            status = outcome.status(),
            "peer schedule synchronized"
        );
        Ok(outcome)
    }
}

async fn persist(broker: &Broker, quality: &str, payload: Value) -> Outcome {
    CommandContext::new(Nature::new(natures::DBINTERFACE, quality), payload)
        .publish(broker)
        .outcome()
        .await
}

#[async_trait]
impl Responder for ScheduleService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn respond(&self, command: Command) -> Outcome {
        let quality = command.nature.quality();
        let result = if quality == natures::SYNCHRONIZE {
            self.synchronize(&command).await
        } else if let Some(op) = Operation::from_quality(quality) {
            self.process(op, &command).await
        } else {
            return Outcome::reject(
                &self.name,
                format!("unsupported schedules quality '{quality}'"),
            );
        };

        result.unwrap_or_else(|e| {
            match &e {
                ScheduleError::Validation(v) => warn!(%quality, error = %v, "invalid schedules command"),
                ScheduleError::Downstream(f) => error!(%quality, failure = %f, "schedules command failed"),
                ScheduleError::Serialization(s) => error!(%quality, error = %s, "schedules command failed"),
            }
            e.into_outcome(&self.name)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers every command with the same outcome and counts calls.
    struct Scripted {
        outcome: Outcome,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Responder for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }
        async fn respond(&self, _command: Command) -> Outcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    struct Harness {
        _broker: Arc<Broker>,
        service: ScheduleService,
        db_calls: Arc<AtomicUsize>,
        acks: Arc<AtomicUsize>,
        publishes: Arc<AtomicUsize>,
    }

    fn scripted(broker: &Broker, nature: Nature, outcome: Outcome) -> Arc<AtomicUsize> {
        let calls = Arc::new(AtomicUsize::new(0));
        broker.route(
            nature,
            Arc::new(Scripted {
                outcome,
                calls: Arc::clone(&calls),
            }),
        );
        calls
    }

    fn harness(db: Outcome, ack: Outcome, publish: Outcome) -> Harness {
        let broker = Arc::new(Broker::default());
        let db_calls = scripted(&broker, Nature::of_kind(natures::DBINTERFACE), db);
        let acks = scripted(
            &broker,
            Nature::new(natures::MESSAGES, natures::ACKNOWLEDGE),
            ack,
        );
        let publishes = scripted(
            &broker,
            Nature::new(natures::MESSAGES, natures::PUBLISH),
            publish,
        );
        Harness {
            service: ScheduleService::new("scheduler", "schedules", &broker),
            _broker: broker,
            db_calls,
            acks,
            publishes,
        }
    }

    fn ok() -> Outcome {
        Outcome::done("messages", json!({}))
    }

    fn command(quality: &str, payload: Value) -> Command {
        Command::direct(Nature::new(natures::SCHEDULES, quality), payload)
    }

    #[tokio::test]
    async fn update_of_missing_entity_is_done_with_null() {
        let h = harness(Outcome::done("dbinterface", Value::Null), ok(), ok());
        let outcome = h
            .service
            .respond(command(
                natures::UPDATE_BY_OBJ_ID_TYPE,
                json!({ "objId": "nope", "type": "t", "enabled": true }),
            ))
            .await;

        assert_eq!(outcome, Outcome::done("scheduler", Value::Null));
        assert_eq!(h.db_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.publishes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_acknowledge_prevents_persistence() {
        let h = harness(
            Outcome::done("dbinterface", json!({ "id": "s1" })),
            Outcome::reject("messages", "unknown message"),
            ok(),
        );
        let outcome = h
            .service
            .respond(Command::queued(
                "m-1",
                Nature::new(natures::SCHEDULES, natures::UPDATE),
                json!({ "id": "s1", "enabled": false }),
            ))
            .await;

        assert_eq!(outcome, Outcome::reject("messages", "unknown message"));
        assert_eq!(h.acks.load(Ordering::SeqCst), 1);
        assert_eq!(h.db_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn direct_command_is_not_acknowledged() {
        let h = harness(Outcome::done("dbinterface", json!({ "id": "s1" })), ok(), ok());
        let outcome = h
            .service
            .respond(command(natures::UPDATE, json!({ "id": "s1", "enabled": false })))
            .await;

        assert!(outcome.is_done());
        assert_eq!(h.acks.load(Ordering::SeqCst), 0);
        assert_eq!(h.publishes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn broadcast_rejection_replaces_store_success() {
        let h = harness(
            Outcome::done("dbinterface", json!({ "id": "s1", "enabled": false })),
            ok(),
            Outcome::reject("messages", "topic unavailable"),
        );
        let outcome = h
            .service
            .respond(command(natures::UPDATE, json!({ "id": "s1", "enabled": false })))
            .await;

        assert_eq!(outcome, Outcome::reject("messages", "topic unavailable"));
        assert_eq!(h.db_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn store_error_is_resurfaced_unchanged() {
        let h = harness(Outcome::error("dbinterface", "disk full"), ok(), ok());
        let outcome = h
            .service
            .respond(command(natures::DELETE, json!({ "id": "s1" })))
            .await;

        assert_eq!(outcome, Outcome::error("dbinterface", "disk full"));
        assert_eq!(h.publishes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn validation_failure_dispatches_nothing() {
        let h = harness(Outcome::done("dbinterface", Value::Null), ok(), ok());
        let outcome = h
            .service
            .respond(Command::queued(
                "m-2",
                Nature::new(natures::SCHEDULES, natures::UPDATE_BY_OBJ_ID_TYPE),
                json!({ "objId": "abc", "type": "t", "schedule": "not-a-cron" }),
            ))
            .await;

        assert_eq!(
            outcome,
            Outcome::reject(
                "scheduler",
                "incorrect 'schedule' in job payload: bad cron format"
            )
        );
        assert_eq!(h.acks.load(Ordering::SeqCst), 0);
        assert_eq!(h.db_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn reads_pass_the_store_outcome_through() {
        let h = harness(
            Outcome::done("dbinterface", json!([{ "id": "s1" }])),
            ok(),
            ok(),
        );
        let outcome = h
            .service
            .respond(command(natures::FIND, json!({ "enabled": true })))
            .await;

        assert_eq!(outcome, Outcome::done("dbinterface", json!([{ "id": "s1" }])));
        assert_eq!(h.publishes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn synchronize_is_neither_acknowledged_nor_rebroadcast() {
        let h = harness(Outcome::done("dbinterface", json!({ "id": "s1" })), ok(), ok());
        let outcome = h
            .service
            .respond(Command::queued(
                "m-3",
                Nature::new(natures::SCHEDULES, natures::SYNCHRONIZE),
                json!({ "operationKind": "update", "entity": { "id": "s1", "objId": "abc", "type": "t" } }),
            ))
            .await;

        assert!(outcome.is_done());
        assert_eq!(h.db_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.acks.load(Ordering::SeqCst), 0);
        assert_eq!(h.publishes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn own_broadcast_is_not_applied_again() {
        let h = harness(Outcome::done("dbinterface", json!({ "id": "s1" })), ok(), ok());
        let outcome = h
            .service
            .respond(command(
                natures::SYNCHRONIZE,
                json!({
                    "operationKind": "update",
                    "entity": { "id": "s1", "enabled": true },
                    "origin": h.service.origin(),
                }),
            ))
            .await;

        assert_eq!(outcome, Outcome::done("scheduler", Value::Null));
        assert_eq!(h.db_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn broadcast_from_another_origin_is_applied() {
        let h = harness(Outcome::done("dbinterface", json!({ "id": "s1" })), ok(), ok());
        let outcome = h
            .service
            .respond(command(
                natures::SYNCHRONIZE,
                json!({
                    "operationKind": "update",
                    "entity": { "id": "s1", "enabled": true },
                    "origin": "scheduler@elsewhere",
                }),
            ))
            .await;

        assert!(outcome.is_done());
        assert_eq!(h.db_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_sync_message_is_rejected() {
        let h = harness(Outcome::done("dbinterface", Value::Null), ok(), ok());
        let outcome = h
            .service
            .respond(command(natures::SYNCHRONIZE, json!({ "entity": {} })))
            .await;
        assert_eq!(outcome.status(), "reject");
        assert_eq!(h.db_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_quality_is_rejected() {
        let h = harness(Outcome::done("dbinterface", Value::Null), ok(), ok());
        let outcome = h.service.respond(command("explode", json!({}))).await;
        assert_eq!(outcome.status(), "reject");
        assert_eq!(outcome.responder(), "scheduler");
    }
}
