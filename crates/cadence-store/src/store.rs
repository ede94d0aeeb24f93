use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use rusqlite::{params_from_iter, Connection};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    db::init_db,
    error::{Result, StoreError},
    query::{Action, Query, QueryResult},
};

type Document = Map<String, Value>;

/// Filter fields mirrored into indexed columns: (document field, column).
const INDEXED_FIELDS: [(&str, &str); 3] = [("id", "id"), ("objId", "obj_id"), ("type", "obj_type")];

/// SQLite-backed JSON document store.
///
/// Thread-safe: wraps the connection in a Mutex. Filters are equality
/// matches on top-level fields; `id`/`objId`/`type` narrow the scan in SQL,
/// every other field is matched after decoding.
pub struct DocumentStore {
    db: Mutex<Connection>,
}

impl DocumentStore {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Run one query and return `{ok: 1, value}`.
    pub fn execute(&self, query: &Query) -> Result<QueryResult> {
        let db = self.db.lock().expect("document store poisoned");
        let collection = query.collection.as_str();
        if collection.is_empty() {
            return Err(StoreError::InvalidQuery("empty collection name".into()));
        }

        let value = match query.action {
            Action::InsertOne => Value::Object(insert_one(&db, collection, query.object_arg(0)?)?),
            Action::FindOne => find(&db, collection, &query.object_arg(0)?, Some(1), 0)?
                .into_iter()
                .next()
                .map(Value::Object)
                .unwrap_or(Value::Null),
            Action::FindOneAndUpdate => find_one_and_update(
                &db,
                collection,
                &query.object_arg(0)?,
                &query.object_arg(1)?,
                &query.object_arg(2)?,
            )?,
            Action::FindOneAndDelete => {
                find_one_and_delete(&db, collection, &query.object_arg(0)?)?
            }
            Action::Find => {
                let options = query.object_arg(1)?;
                let limit = options
                    .get("limit")
                    .and_then(Value::as_u64)
                    .map(|n| n as usize);
                let skip = options.get("skip").and_then(Value::as_u64).unwrap_or(0) as usize;
                Value::Array(
                    find(&db, collection, &query.object_arg(0)?, limit, skip)?
                        .into_iter()
                        .map(Value::Object)
                        .collect(),
                )
            }
        };

        debug!(%collection, action = ?query.action, found = !value.is_null(), "query executed");
        Ok(QueryResult::ok(value))
    }
}

// --- private helpers ---------------------------------------------------------

fn insert_one(db: &Connection, collection: &str, doc: Document) -> Result<Document> {
    write_doc(db, collection, &doc)?;
    Ok(doc)
}

fn find_one_and_update(
    db: &Connection,
    collection: &str,
    filter: &Document,
    update: &Document,
    options: &Document,
) -> Result<Value> {
    let set = operator(update, "$set")?;
    let set_on_insert = operator(update, "$setOnInsert")?;
    let upsert = options
        .get("upsert")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let return_original = options
        .get("returnOriginal")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    match find(db, collection, filter, Some(1), 0)?.into_iter().next() {
        Some(original) => {
            let mut doc = original.clone();
            for (field, value) in set {
                // The primary key of a stored document never changes.
                if field != "id" {
                    doc.insert(field, value);
                }
            }
            write_doc(db, collection, &doc)?;
            Ok(Value::Object(if return_original { original } else { doc }))
        }
        None if upsert => {
            let mut doc = filter.clone();
            doc.extend(set_on_insert);
            doc.extend(set);
            write_doc(db, collection, &doc)?;
            Ok(if return_original {
                Value::Null
            } else {
                Value::Object(doc)
            })
        }
        None => Ok(Value::Null),
    }
}

fn find_one_and_delete(db: &Connection, collection: &str, filter: &Document) -> Result<Value> {
    let Some(doc) = find(db, collection, filter, Some(1), 0)?.into_iter().next() else {
        return Ok(Value::Null);
    };
    let id = doc_id(&doc)?;
    db.execute(
        "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
        rusqlite::params![collection, id],
    )?;
    Ok(Value::Object(doc))
}

/// All documents of `collection` matching `filter`, in insertion order.
fn find(
    db: &Connection,
    collection: &str,
    filter: &Document,
    limit: Option<usize>,
    skip: usize,
) -> Result<Vec<Document>> {
    let mut sql = String::from("SELECT doc FROM documents WHERE collection = ?1");
    let mut params = vec![collection.to_string()];
    for (field, column) in INDEXED_FIELDS {
        if let Some(Value::String(v)) = filter.get(field) {
            params.push(v.clone());
            sql.push_str(&format!(" AND {column} = ?{}", params.len()));
        }
    }
    sql.push_str(" ORDER BY created_at, id");

    let mut stmt = db.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(params.iter()), |row| row.get::<_, String>(0))?;

    let mut docs = Vec::new();
    for raw in rows {
        let doc: Document = serde_json::from_str(&raw?)?;
        if matches(&doc, filter) {
            docs.push(doc);
        }
    }
    Ok(docs
        .into_iter()
        .skip(skip)
        .take(limit.unwrap_or(usize::MAX))
        .collect())
}

fn write_doc(db: &Connection, collection: &str, doc: &Document) -> Result<()> {
    let id = doc_id(doc)?;
    let obj_id = doc.get("objId").and_then(Value::as_str);
    let obj_type = doc.get("type").and_then(Value::as_str);
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true);
    let json = serde_json::to_string(doc)?;

    db.execute(
        "INSERT INTO documents (collection, id, obj_id, obj_type, doc, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
         ON CONFLICT (collection, id) DO UPDATE SET
            obj_id = excluded.obj_id,
            obj_type = excluded.obj_type,
            doc = excluded.doc,
            updated_at = excluded.updated_at",
        rusqlite::params![collection, id, obj_id, obj_type, json, now],
    )?;
    Ok(())
}

fn doc_id(doc: &Document) -> Result<&str> {
    doc.get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or(StoreError::MissingId)
}

fn operator(update: &Document, name: &str) -> Result<Document> {
    match update.get(name) {
        None | Some(Value::Null) => Ok(Document::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(other) => Err(StoreError::InvalidQuery(format!(
            "'{name}' must be an object, got {other}"
        ))),
    }
}

fn matches(doc: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(field, expected)| doc.get(field).unwrap_or(&Value::Null) == expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> DocumentStore {
        DocumentStore::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    fn run(store: &DocumentStore, action: Action, args: Vec<Value>) -> Value {
        store
            .execute(&Query::new("schedules", action, args))
            .unwrap()
            .value
    }

    fn seed(store: &DocumentStore) {
        run(
            store,
            Action::InsertOne,
            vec![json!({"id": "s1", "objId": "abc", "type": "t", "enabled": true, "schedule": "* * * * *"})],
        );
        run(
            store,
            Action::InsertOne,
            vec![json!({"id": "s2", "objId": "def", "type": "t", "enabled": false})],
        );
    }

    #[test]
    fn find_one_by_compound_key() {
        let store = store();
        seed(&store);
        let doc = run(&store, Action::FindOne, vec![json!({"objId": "abc", "type": "t"})]);
        assert_eq!(doc["id"], "s1");
    }

    #[test]
    fn find_one_and_update_merges_set_fields() {
        let store = store();
        seed(&store);
        let doc = run(
            &store,
            Action::FindOneAndUpdate,
            vec![
                json!({"objId": "abc", "type": "t"}),
                json!({"$set": {"schedule": "*/5 * * * *", "id": "hijack"}}),
                json!({"returnOriginal": false, "upsert": false}),
            ],
        );
        assert_eq!(doc["schedule"], "*/5 * * * *");
        assert_eq!(doc["enabled"], true);
        // id is immutable
        assert_eq!(doc["id"], "s1");
    }

    #[test]
    fn update_without_match_returns_null() {
        let store = store();
        let doc = run(
            &store,
            Action::FindOneAndUpdate,
            vec![json!({"objId": "nope", "type": "t"}), json!({"$set": {"enabled": true}})],
        );
        assert!(doc.is_null());
    }

    #[test]
    fn upsert_inserts_filter_and_set_on_insert() {
        let store = store();
        let doc = run(
            &store,
            Action::FindOneAndUpdate,
            vec![
                json!({"objId": "new", "type": "t"}),
                json!({"$set": {"enabled": true}, "$setOnInsert": {"id": "s9"}}),
                json!({"upsert": true}),
            ],
        );
        assert_eq!(doc["id"], "s9");
        assert_eq!(doc["objId"], "new");

        let found = run(&store, Action::FindOne, vec![json!({"id": "s9"})]);
        assert_eq!(found["enabled"], true);
    }

    #[test]
    fn delete_returns_document_then_null() {
        let store = store();
        seed(&store);
        let doc = run(&store, Action::FindOneAndDelete, vec![json!({"id": "s2"})]);
        assert_eq!(doc["objId"], "def");
        let again = run(&store, Action::FindOneAndDelete, vec![json!({"id": "s2"})]);
        assert!(again.is_null());
    }

    #[test]
    fn find_filters_on_plain_fields_and_pages() {
        let store = store();
        seed(&store);
        let enabled = run(&store, Action::Find, vec![json!({"enabled": true})]);
        assert_eq!(enabled.as_array().unwrap().len(), 1);

        let page = run(&store, Action::Find, vec![json!({}), json!({"limit": 1, "skip": 1})]);
        let page = page.as_array().unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0]["id"], "s2");
    }

    #[test]
    fn insert_without_id_is_invalid() {
        let store = store();
        let err = store
            .execute(&Query::new("schedules", Action::InsertOne, vec![json!({"a": 1})]))
            .unwrap_err();
        assert!(err.is_rejection());
    }
}
