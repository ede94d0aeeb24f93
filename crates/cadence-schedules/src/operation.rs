//! Per-operation policy: which fields are accepted, how the persistence
//! command is built, and whether the result is synchronized to peers.

use cadence_protocol::{natures, SyncKind};
use serde_json::{json, Map, Value};

use crate::{
    error::{Result, ValidationError},
    model::{validate, validate_schedule, FieldTable, FieldType, Schedule, ValidationReport},
};

/// Fields that identify a schedule and are never part of an update delta.
const KEY_FIELDS: [&str; 3] = ["id", "objId", "type"];
/// Paging fields accepted by `find`, outside the schedule field table.
const PAGING_FIELDS: [&str; 2] = ["limit", "offset"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    UpdateByObjIdType,
    UpsertByObjIdType,
    FindById,
    FindByObjIdType,
    Delete,
    DeleteByObjIdType,
    Find,
}

/// Input that passed an operation's validation.
#[derive(Debug, Clone)]
pub struct Validated {
    pub input: Map<String, Value>,
    pub report: ValidationReport,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Operation::Create,
        Operation::Update,
        Operation::UpdateByObjIdType,
        Operation::UpsertByObjIdType,
        Operation::FindById,
        Operation::FindByObjIdType,
        Operation::Delete,
        Operation::DeleteByObjIdType,
        Operation::Find,
    ];

    pub fn from_quality(quality: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.quality() == quality)
    }

    /// Quality of the `schedules` nature served by this operation.
    pub fn quality(self) -> &'static str {
        match self {
            Operation::Create => natures::CREATE,
            Operation::Update => natures::UPDATE,
            Operation::UpdateByObjIdType => natures::UPDATE_BY_OBJ_ID_TYPE,
            Operation::UpsertByObjIdType => natures::UPSERT_BY_OBJ_ID_TYPE,
            Operation::FindById => natures::FIND_BY_ID,
            Operation::FindByObjIdType => natures::FIND_BY_OBJ_ID_TYPE,
            Operation::Delete => natures::DELETE,
            Operation::DeleteByObjIdType => natures::DELETE_BY_OBJ_ID_TYPE,
            Operation::Find => natures::FIND,
        }
    }

    /// Quality of the `dbinterface` command this operation issues.
    pub fn db_quality(self) -> &'static str {
        match self {
            Operation::Create => natures::DB_INSERT_ONE,
            Operation::Update => natures::DB_UPDATE_ONE,
            Operation::UpdateByObjIdType => natures::DB_UPDATE_ONE_BY_OBJ_ID_TYPE,
            Operation::UpsertByObjIdType => natures::DB_UPSERT_ONE_BY_OBJ_ID_TYPE,
            Operation::FindById => natures::DB_FIND_BY_ID,
            Operation::FindByObjIdType => natures::DB_FIND_BY_OBJ_ID_TYPE,
            Operation::Delete => natures::DB_DELETE_ONE,
            Operation::DeleteByObjIdType => natures::DB_DELETE_ONE_BY_OBJ_ID_TYPE,
            Operation::Find => natures::DB_FIND,
        }
    }

    /// Kind of synchronization broadcast after a successful write, `None`
    /// for reads.
    pub fn sync_kind(self) -> Option<SyncKind> {
        match self {
            Operation::Create => Some(SyncKind::Create),
            Operation::Update | Operation::UpdateByObjIdType | Operation::UpsertByObjIdType => {
                Some(SyncKind::Update)
            }
            Operation::Delete | Operation::DeleteByObjIdType => Some(SyncKind::Delete),
            Operation::FindById | Operation::FindByObjIdType | Operation::Find => None,
        }
    }

    pub fn is_mutation(self) -> bool {
        self.sync_kind().is_some()
    }

    pub fn field_table(self) -> FieldTable {
        match self {
            Operation::Create => FieldTable::keys().relax(&["id"]),
            Operation::Update => FieldTable::query_keys().require(&["id"]),
            Operation::UpdateByObjIdType => FieldTable::query_keys().require(&["objId", "type"]),
            Operation::UpsertByObjIdType => FieldTable::keys()
                .relax(&["id"])
                .require(&["objId", "type"]),
            Operation::FindById | Operation::Delete => FieldTable::keys().only(&["id"]),
            Operation::FindByObjIdType | Operation::DeleteByObjIdType => FieldTable::keys()
                .only(&["objId", "type"])
                .require(&["objId", "type"]),
            Operation::Find => FieldTable::query_keys()
                .with_optional("limit", FieldType::Number)
                .with_optional("offset", FieldType::Number),
        }
    }

    /// Validate `payload` against this operation's field table. The
    /// schedule format of a write is checked after the generic pass.
    pub fn validate(self, payload: &Value) -> std::result::Result<Validated, ValidationError> {
        let report = validate(payload, &self.field_table())?;
        let input = payload.as_object().cloned().unwrap_or_default();

        if self.is_mutation() {
            if let Some(schedule) = input.get("schedule").filter(|v| !v.is_null()) {
                validate_schedule(schedule)?;
            }
        }
        for field in PAGING_FIELDS {
            if report.is_present(field) && input[field].as_u64().is_none() {
                return Err(ValidationError::field(field, "expected a non-negative integer"));
            }
        }
        Ok(Validated { input, report })
    }

    /// Payload of the `dbinterface` command for `validated` input.
    pub fn db_payload(self, collection: &str, validated: &Validated) -> Result<Value> {
        let input = &validated.input;
        let payload = match self {
            Operation::Create => json!({
                "collection": collection,
                "content": serde_json::to_value(Schedule::from_payload(input)?)?,
            }),
            Operation::Update => json!({
                "collection": collection,
                "id": input["id"],
                "content": delta(validated, &KEY_FIELDS),
            }),
            Operation::UpdateByObjIdType => json!({
                "collection": collection,
                "objId": input["objId"],
                "type": input["type"],
                "content": delta(validated, &KEY_FIELDS),
            }),
            Operation::UpsertByObjIdType => {
                let schedule = Schedule::from_payload(input)?;
                let mut content = serde_json::to_value(&schedule)?;
                if let Some(content) = content.as_object_mut() {
                    for key in KEY_FIELDS {
                        content.remove(key);
                    }
                }
                json!({
                    "collection": collection,
                    "id": schedule.id,
                    "objId": input["objId"],
                    "type": input["type"],
                    "content": content,
                })
            }
            Operation::FindById | Operation::Delete => json!({
                "collection": collection,
                "id": input["id"],
            }),
            Operation::FindByObjIdType | Operation::DeleteByObjIdType => json!({
                "collection": collection,
                "objId": input["objId"],
                "type": input["type"],
            }),
            Operation::Find => json!({
                "collection": collection,
                "filter": delta(validated, &PAGING_FIELDS),
                "limit": input.get("limit").cloned().unwrap_or(Value::Null),
                "offset": input.get("offset").cloned().unwrap_or(Value::Null),
            }),
        };
        Ok(payload)
    }
}

/// Supplied table fields of the input, minus `excluded`.
fn delta(validated: &Validated, excluded: &[&str]) -> Value {
    let content: Map<String, Value> = validated
        .report
        .present()
        .filter(|field| !excluded.contains(field))
        .filter_map(|field| {
            validated
                .input
                .get(field)
                .map(|v| (field.to_string(), v.clone()))
        })
        .collect();
    Value::Object(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_quality_maps_back_to_its_operation() {
        for op in Operation::ALL {
            assert_eq!(Operation::from_quality(op.quality()), Some(op));
        }
        assert_eq!(Operation::from_quality(natures::SYNCHRONIZE), None);
    }

    #[test]
    fn only_writes_are_synchronized() {
        assert_eq!(Operation::Create.sync_kind(), Some(SyncKind::Create));
        assert_eq!(Operation::DeleteByObjIdType.sync_kind(), Some(SyncKind::Delete));
        assert!(!Operation::Find.is_mutation());
        assert!(!Operation::FindByObjIdType.is_mutation());
    }

    #[test]
    fn create_does_not_require_an_id() {
        let payload = json!({ "schedule": "*/5 * * * *", "rest": { "url": "http://x" } });
        assert!(Operation::Create.validate(&payload).is_ok());
    }

    #[test]
    fn update_by_obj_id_type_requires_both_keys() {
        let err = Operation::UpdateByObjIdType
            .validate(&json!({ "objId": "abc", "enabled": true }))
            .unwrap_err();
        assert_eq!(err.field_name(), Some("type"));
    }

    #[test]
    fn bad_cron_in_update_names_schedule() {
        let err = Operation::UpdateByObjIdType
            .validate(&json!({ "objId": "abc", "type": "t", "schedule": "not-a-cron" }))
            .unwrap_err();
        assert_eq!(err, ValidationError::field("schedule", "bad cron format"));
    }

    #[test]
    fn past_timestamp_does_not_block_a_find() {
        assert!(Operation::Find.validate(&json!({ "schedule": 1 })).is_ok());
    }

    #[test]
    fn negative_limit_is_rejected() {
        let err = Operation::Find.validate(&json!({ "limit": -1 })).unwrap_err();
        assert_eq!(err.field_name(), Some("limit"));
    }

    #[test]
    fn update_delta_excludes_keys_and_unknown_fields() {
        let validated = Operation::UpdateByObjIdType
            .validate(&json!({
                "id": "sneaky",
                "objId": "abc",
                "type": "t",
                "enabled": false,
                "colour": "blue",
            }))
            .unwrap();
        let payload = Operation::UpdateByObjIdType
            .db_payload("schedules", &validated)
            .unwrap();
        assert_eq!(
            payload,
            json!({
                "collection": "schedules",
                "objId": "abc",
                "type": "t",
                "content": { "enabled": false },
            })
        );
    }

    #[test]
    fn create_content_carries_generated_id_and_defaults() {
        let validated = Operation::Create
            .validate(&json!({ "schedule": "*/5 * * * *", "rest": { "url": "http://x" } }))
            .unwrap();
        let payload = Operation::Create.db_payload("schedules", &validated).unwrap();
        let content = &payload["content"];
        assert!(content["id"].as_str().is_some_and(|id| !id.is_empty()));
        assert_eq!(content["rest"]["method"], "GET");
    }

    #[test]
    fn upsert_keeps_supplied_id_out_of_content() {
        let validated = Operation::UpsertByObjIdType
            .validate(&json!({
                "id": "s7",
                "objId": "abc",
                "type": "t",
                "schedule": "0 * * * *",
                "rest": { "url": "http://x" },
            }))
            .unwrap();
        let payload = Operation::UpsertByObjIdType
            .db_payload("schedules", &validated)
            .unwrap();
        assert_eq!(payload["id"], "s7");
        assert!(payload["content"].get("id").is_none());
        assert!(payload["content"].get("objId").is_none());
        assert_eq!(payload["content"]["schedule"], "0 * * * *");
    }

    #[test]
    fn find_splits_filter_and_paging() {
        let validated = Operation::Find
            .validate(&json!({ "enabled": true, "limit": 5 }))
            .unwrap();
        let payload = Operation::Find.db_payload("schedules", &validated).unwrap();
        assert_eq!(payload["filter"], json!({ "enabled": true }));
        assert_eq!(payload["limit"], 5);
        assert!(payload["offset"].is_null());
    }
}
