use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which kind of local mutation a synchronization message reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for SyncKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncKind::Create => "create",
            SyncKind::Update => "update",
            SyncKind::Delete => "delete",
        };
        write!(f, "{s}")
    }
}

/// Message carried on the synchronization topic.
/// Wire: `{ "operationKind": "update", "entity": {...}, "origin": "..." }`
///
/// `origin` identifies the publishing instance so it can skip its own
/// broadcasts. Messages without one are applied by every receiver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncMessage {
    #[serde(rename = "operationKind")]
    pub operation_kind: SyncKind,
    pub entity: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}
