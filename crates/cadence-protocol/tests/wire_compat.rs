// Verify wire format matches what peer instances and queue producers expect.
// These tests ensure protocol compatibility is never broken.

use cadence_protocol::frames::{Command, Nature, Outcome};
use cadence_protocol::natures;
use cadence_protocol::sync::{SyncKind, SyncMessage};

#[test]
fn queued_command_parses_with_ack_id() {
    let json = r#"{"id":"msg-7","nature":{"type":"schedules","quality":"updatebyobjidtype"},"payload":{"objId":"abc","type":"t"}}"#;
    let cmd: Command = serde_json::from_str(json).unwrap();

    assert_eq!(cmd.id.as_deref(), Some("msg-7"));
    assert_eq!(cmd.nature.kind, natures::SCHEDULES);
    assert_eq!(cmd.nature.quality(), natures::UPDATE_BY_OBJ_ID_TYPE);
    assert_eq!(cmd.payload["objId"], "abc");
}

#[test]
fn direct_command_omits_id() {
    let cmd = Command::direct(
        Nature::new(natures::DBINTERFACE, natures::DB_FIND_BY_ID),
        serde_json::json!({"id": "s1"}),
    );
    let json = serde_json::to_string(&cmd).unwrap();

    // "id" must only appear inside the payload
    assert!(json.starts_with(r#"{"nature""#));
    assert!(json.contains(r#""type":"dbinterface""#));
}

#[test]
fn nature_without_quality_parses() {
    let nature: Nature = serde_json::from_str(r#"{"type":"schedules"}"#).unwrap();
    assert!(nature.quality.is_none());
    assert_eq!(nature.to_string(), "schedules");
}

#[test]
fn done_outcome_serialization() {
    let outcome = Outcome::done("dblayer", serde_json::json!({"id": "s1"}));
    let json = serde_json::to_string(&outcome).unwrap();

    assert!(json.contains(r#""status":"done""#));
    assert!(json.contains(r#""responder":"dblayer""#));
    // error field must be absent on success
    assert!(!json.contains(r#""error""#));
}

#[test]
fn reject_and_error_are_distinct_on_the_wire() {
    let reject = serde_json::to_value(Outcome::reject("bl", "bad input")).unwrap();
    let error = serde_json::to_value(Outcome::error("bl", "store down")).unwrap();

    assert_eq!(reject["status"], "reject");
    assert_eq!(error["status"], "error");
    assert_eq!(reject["error"], "bad input");
}

#[test]
fn outcome_round_trips_null_result() {
    let json = r#"{"status":"done","responder":"dblayer","result":null}"#;
    let outcome: Outcome = serde_json::from_str(json).unwrap();
    match outcome {
        Outcome::Done { result, .. } => assert!(result.is_null()),
        other => panic!("expected done, got {other:?}"),
    }
}

#[test]
fn sync_message_uses_camel_case_kind() {
    let msg = SyncMessage {
        operation_kind: SyncKind::Update,
        entity: serde_json::json!({"id": "s1"}),
        origin: Some("scheduler@a1".into()),
    };
    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains(r#""operationKind":"update""#));
    assert!(json.contains(r#""origin":"scheduler@a1""#));

    let back: SyncMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(back.operation_kind, SyncKind::Update);
}

#[test]
fn sync_message_without_origin_still_parses() {
    let json = r#"{"operationKind":"delete","entity":{"id":"s1"}}"#;
    let msg: SyncMessage = serde_json::from_str(json).unwrap();
    assert_eq!(msg.operation_kind, SyncKind::Delete);
    assert!(msg.origin.is_none());
}
