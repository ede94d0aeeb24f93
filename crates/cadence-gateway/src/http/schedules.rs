//! REST front end of the `schedules` nature.
//!
//! Every route builds the payload of one schedules command, dispatches it on
//! the broker and maps its outcome to a response: `done` → 200 with the
//! result (`null` when nothing matched), `reject` → 400, `error` → 500. Error
//! bodies are `{code, responder, message}`.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cadence_core::CadenceError;
use cadence_messaging::{context::TIMEOUT_RESPONDER, CommandContext};
use cadence_protocol::{natures, Nature, Outcome};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::app::AppState;

/// Query string of `GET /schedules`.
#[derive(Debug, Default, Deserialize)]
pub struct FindParams {
    /// `"true"` (any case) matches enabled schedules, anything else disabled ones.
    pub enabled: Option<String>,
    #[serde(rename = "objId")]
    pub obj_id: Option<String>,
    #[serde(rename = "type")]
    pub obj_type: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl FindParams {
    fn into_payload(self) -> Value {
        let mut payload = Map::new();
        if let Some(enabled) = self.enabled {
            payload.insert("enabled".into(), json!(enabled.eq_ignore_ascii_case("true")));
        }
        if let Some(obj_id) = self.obj_id {
            payload.insert("objId".into(), json!(obj_id));
        }
        if let Some(obj_type) = self.obj_type {
            payload.insert("type".into(), json!(obj_type));
        }
        if let Some(limit) = self.limit {
            payload.insert("limit".into(), json!(limit));
        }
        if let Some(offset) = self.offset {
            payload.insert("offset".into(), json!(offset));
        }
        Value::Object(payload)
    }
}

/// POST /schedules
pub async fn create(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> Response {
    dispatch(&state, natures::CREATE, body).await
}

/// PUT /schedules/{id}: create under a caller-chosen id, replacing any
/// schedule already stored under it.
pub async fn replace(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    dispatch(&state, natures::CREATE, with_keys(body, [("id", id)])).await
}

/// PATCH /schedules/{id}
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    dispatch(&state, natures::UPDATE, with_keys(body, [("id", id)])).await
}

/// POST /schedules/objid/{obj_id}/type/{obj_type}
pub async fn upsert_by_obj_id_type(
    State(state): State<Arc<AppState>>,
    Path((obj_id, obj_type)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    let payload = with_keys(body, [("objId", obj_id), ("type", obj_type)]);
    dispatch(&state, natures::UPSERT_BY_OBJ_ID_TYPE, payload).await
}

/// PATCH /schedules/objid/{obj_id}/type/{obj_type}
pub async fn update_by_obj_id_type(
    State(state): State<Arc<AppState>>,
    Path((obj_id, obj_type)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    let payload = with_keys(body, [("objId", obj_id), ("type", obj_type)]);
    dispatch(&state, natures::UPDATE_BY_OBJ_ID_TYPE, payload).await
}

/// GET /schedules/{id}
pub async fn find_by_id(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    dispatch(&state, natures::FIND_BY_ID, json!({ "id": id })).await
}

/// GET /schedules/objid/{obj_id}/type/{obj_type}
pub async fn find_by_obj_id_type(
    State(state): State<Arc<AppState>>,
    Path((obj_id, obj_type)): Path<(String, String)>,
) -> Response {
    let payload = json!({ "objId": obj_id, "type": obj_type });
    dispatch(&state, natures::FIND_BY_OBJ_ID_TYPE, payload).await
}

/// DELETE /schedules/{id}
pub async fn delete(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    dispatch(&state, natures::DELETE, json!({ "id": id })).await
}

/// DELETE /schedules/objid/{obj_id}/type/{obj_type}
pub async fn delete_by_obj_id_type(
    State(state): State<Arc<AppState>>,
    Path((obj_id, obj_type)): Path<(String, String)>,
) -> Response {
    let payload = json!({ "objId": obj_id, "type": obj_type });
    dispatch(&state, natures::DELETE_BY_OBJ_ID_TYPE, payload).await
}

/// GET /schedules?enabled=&objId=&type=&limit=&offset=
pub async fn find(State(state): State<Arc<AppState>>, Query(params): Query<FindParams>) -> Response {
    dispatch(&state, natures::FIND, params.into_payload()).await
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Path parameters win over body fields of the same name. A non-object body
/// is passed through untouched and fails validation downstream.
fn with_keys<const N: usize>(mut body: Value, keys: [(&str, String); N]) -> Value {
    if let Some(object) = body.as_object_mut() {
        for (key, value) in keys {
            object.insert(key.to_string(), Value::String(value));
        }
    }
    body
}

async fn dispatch(state: &AppState, quality: &str, payload: Value) -> Response {
    let outcome = CommandContext::new(Nature::new(natures::SCHEDULES, quality), payload)
        .publish(&state.broker)
        .outcome()
        .await;
    outcome_response(state, outcome)
}

fn outcome_response(state: &AppState, outcome: Outcome) -> Response {
    let (responder, error) = match outcome {
        Outcome::Done { result, .. } => return (StatusCode::OK, Json(result)).into_response(),
        Outcome::Reject { responder, error } => {
            let reason = message(error);
            let error = if responder == state.config.instance.name {
                CadenceError::Validation(reason)
            } else {
                CadenceError::Rejected {
                    responder: responder.clone(),
                    reason,
                }
            };
            (responder, error)
        }
        Outcome::Error { responder, error } => {
            let error = if responder == TIMEOUT_RESPONDER {
                CadenceError::Timeout {
                    ms: state.config.messaging.command_timeout_ms,
                }
            } else {
                CadenceError::Infrastructure {
                    responder: responder.clone(),
                    reason: message(error),
                }
            };
            (responder, error)
        }
    };

    let status = if error.is_rejection() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    warn!(%responder, code = error.code(), %error, "schedules request failed");
    (
        status,
        Json(json!({
            "code": error.code(),
            "responder": responder,
            "message": error.to_string(),
        })),
    )
        .into_response()
}

fn message(error: Value) -> String {
    match error {
        Value::String(s) => s,
        other => other.to_string(),
    }
}
