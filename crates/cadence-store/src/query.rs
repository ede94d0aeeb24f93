use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, StoreError};

/// Operation a [`Query`] asks the store to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    /// `args: [document]`: insert, replacing any document with the same id.
    InsertOne,
    /// `args: [filter]`
    FindOne,
    /// `args: [filter, {"$set": {...}, "$setOnInsert": {...}}, {"upsert": bool, "returnOriginal": bool}]`
    FindOneAndUpdate,
    /// `args: [filter]`
    FindOneAndDelete,
    /// `args: [filter, {"limit": n, "skip": n}]`
    Find,
}

/// Wire: `{ "collection": "schedules", "action": "findOneAndUpdate", "args": [...] }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub collection: String,
    pub action: Action,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl Query {
    pub fn new(collection: impl Into<String>, action: Action, args: Vec<Value>) -> Self {
        Self {
            collection: collection.into(),
            action,
            args,
        }
    }

    /// The object at `args[index]`; absent or `null` yields an empty object.
    pub(crate) fn object_arg(&self, index: usize) -> Result<Map<String, Value>> {
        match self.args.get(index) {
            None | Some(Value::Null) => Ok(Map::new()),
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(other) => Err(StoreError::InvalidQuery(format!(
                "argument {index} of {:?} must be an object, got {other}",
                self.action
            ))),
        }
    }
}

/// Wire: `{ "ok": 1, "value": {...} | [...] | null }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub ok: u8,
    pub value: Value,
}

impl QueryResult {
    pub fn ok(value: Value) -> Self {
        Self { ok: 1, value }
    }
}
