use std::sync::Arc;

use async_trait::async_trait;
use cadence_messaging::Responder;
use cadence_protocol::{natures, Command, Outcome};
use serde_json::{json, Map, Value};
use tracing::{debug, error, warn};

use crate::{
    error::{Result, StoreError},
    query::{Action, Query},
    store::DocumentStore,
};

/// Responder name reported in every outcome of the store.
pub const DBINTERFACE_RESPONDER: &str = "dbinterface";

/// Serves the `dbinterface` nature on top of a [`DocumentStore`].
///
/// Payload fields: `collection` (required), `id`, `objId`, `type`, `content`
/// (the document or `$set` delta), `filter`, `limit`, `offset`.
pub struct DbInterface {
    store: Arc<DocumentStore>,
}

impl DbInterface {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Responder for DbInterface {
    fn name(&self) -> &str {
        DBINTERFACE_RESPONDER
    }

    async fn respond(&self, command: Command) -> Outcome {
        let quality = command.nature.quality();
        let result = build_query(quality, &command.payload).and_then(|q| self.store.execute(&q));

        match result {
            Ok(result) => {
                debug!(%quality, found = !result.value.is_null(), "dbinterface answered");
                Outcome::done(DBINTERFACE_RESPONDER, result.value)
            }
            Err(e) if e.is_rejection() => {
                warn!(%quality, error = %e, "dbinterface rejected command");
                Outcome::reject(DBINTERFACE_RESPONDER, e)
            }
            Err(e) => {
                error!(%quality, error = %e, "dbinterface failed");
                Outcome::error(DBINTERFACE_RESPONDER, e)
            }
        }
    }
}

/// Translate one `dbinterface` quality and its payload into a store query.
pub fn build_query(quality: &str, payload: &Value) -> Result<Query> {
    let collection = string_field(payload, "collection")?;
    let update_options = |upsert: bool| json!({ "returnOriginal": false, "upsert": upsert });

    let (action, args) = match quality {
        natures::DB_INSERT_ONE => (Action::InsertOne, vec![object_field(payload, "content")?]),
        natures::DB_UPDATE_ONE => (
            Action::FindOneAndUpdate,
            vec![
                by_id(payload)?,
                json!({ "$set": object_field(payload, "content")? }),
                update_options(false),
            ],
        ),
        natures::DB_UPDATE_ONE_BY_OBJ_ID_TYPE => (
            Action::FindOneAndUpdate,
            vec![
                by_obj_id_type(payload)?,
                json!({ "$set": object_field(payload, "content")? }),
                update_options(false),
            ],
        ),
        natures::DB_UPSERT_ONE_BY_OBJ_ID_TYPE => (
            Action::FindOneAndUpdate,
            vec![
                by_obj_id_type(payload)?,
                json!({
                    "$set": object_field(payload, "content")?,
                    "$setOnInsert": { "id": string_field(payload, "id")? },
                }),
                update_options(true),
            ],
        ),
        natures::DB_FIND_BY_ID => (Action::FindOne, vec![by_id(payload)?]),
        natures::DB_FIND_BY_OBJ_ID_TYPE => (Action::FindOne, vec![by_obj_id_type(payload)?]),
        natures::DB_DELETE_ONE => (Action::FindOneAndDelete, vec![by_id(payload)?]),
        natures::DB_DELETE_ONE_BY_OBJ_ID_TYPE => {
            (Action::FindOneAndDelete, vec![by_obj_id_type(payload)?])
        }
        natures::DB_FIND => {
            let filter = match payload.get("filter") {
                None | Some(Value::Null) => Value::Object(Map::new()),
                Some(_) => object_field(payload, "filter")?,
            };
            let mut options = Map::new();
            if let Some(limit) = payload.get("limit").filter(|v| !v.is_null()) {
                options.insert("limit".into(), limit.clone());
            }
            if let Some(offset) = payload.get("offset").filter(|v| !v.is_null()) {
                options.insert("skip".into(), offset.clone());
            }
            (Action::Find, vec![filter, Value::Object(options)])
        }
        other => {
            return Err(StoreError::InvalidQuery(format!(
                "unsupported dbinterface quality '{other}'"
            )))
        }
    };

    Ok(Query::new(collection, action, args))
}

fn by_id(payload: &Value) -> Result<Value> {
    Ok(json!({ "id": string_field(payload, "id")? }))
}

fn by_obj_id_type(payload: &Value) -> Result<Value> {
    Ok(json!({
        "objId": string_field(payload, "objId")?,
        "type": string_field(payload, "type")?,
    }))
}

fn string_field<'a>(payload: &'a Value, field: &str) -> Result<&'a str> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::InvalidQuery(format!("missing string '{field}' in payload")))
}

fn object_field(payload: &Value, field: &str) -> Result<Value> {
    match payload.get(field) {
        Some(v @ Value::Object(_)) => Ok(v.clone()),
        _ => Err(StoreError::InvalidQuery(format!(
            "missing object '{field}' in payload"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_protocol::Nature;
    use rusqlite::Connection;

    fn interface() -> DbInterface {
        let store = DocumentStore::new(Connection::open_in_memory().unwrap()).unwrap();
        DbInterface::new(Arc::new(store))
    }

    async fn ask(db: &DbInterface, quality: &str, payload: Value) -> Outcome {
        db.respond(Command::direct(
            Nature::new(natures::DBINTERFACE, quality),
            payload,
        ))
        .await
    }

    #[test]
    fn update_by_obj_id_type_builds_find_one_and_update() {
        let query = build_query(
            natures::DB_UPDATE_ONE_BY_OBJ_ID_TYPE,
            &json!({
                "collection": "schedules",
                "objId": "abc",
                "type": "t",
                "content": { "enabled": false },
            }),
        )
        .unwrap();

        assert_eq!(query.action, Action::FindOneAndUpdate);
        assert_eq!(
            query.args,
            vec![
                json!({ "objId": "abc", "type": "t" }),
                json!({ "$set": { "enabled": false } }),
                json!({ "returnOriginal": false, "upsert": false }),
            ]
        );
    }

    #[test]
    fn find_maps_offset_to_skip() {
        let query = build_query(
            natures::DB_FIND,
            &json!({ "collection": "schedules", "filter": { "enabled": true }, "limit": 10, "offset": 20 }),
        )
        .unwrap();
        assert_eq!(query.args[1], json!({ "limit": 10, "skip": 20 }));
    }

    #[test]
    fn missing_collection_is_invalid() {
        let err = build_query(natures::DB_FIND_BY_ID, &json!({ "id": "x" })).unwrap_err();
        assert!(err.is_rejection());
    }

    #[tokio::test]
    async fn insert_then_find_by_obj_id_type() {
        let db = interface();
        let inserted = ask(
            &db,
            natures::DB_INSERT_ONE,
            json!({ "collection": "schedules", "content": { "id": "s1", "objId": "abc", "type": "t" } }),
        )
        .await;
        assert!(inserted.is_done());

        let found = ask(
            &db,
            natures::DB_FIND_BY_OBJ_ID_TYPE,
            json!({ "collection": "schedules", "objId": "abc", "type": "t" }),
        )
        .await;
        match found {
            Outcome::Done { result, .. } => assert_eq!(result["id"], "s1"),
            other => panic!("expected done, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_of_missing_id_is_done_with_null() {
        let db = interface();
        let outcome = ask(
            &db,
            natures::DB_DELETE_ONE,
            json!({ "collection": "schedules", "id": "missing-id" }),
        )
        .await;
        assert_eq!(outcome, Outcome::done(DBINTERFACE_RESPONDER, Value::Null));
    }

    #[tokio::test]
    async fn unknown_quality_is_rejected() {
        let db = interface();
        let outcome = ask(&db, "drop", json!({ "collection": "schedules" })).await;
        assert_eq!(outcome.status(), "reject");
    }
}
