use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Routing tag of a command.
/// Wire: `{ "type": "dbinterface", "quality": "updateonebyobjidtype" }`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nature {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
}

impl Nature {
    pub fn new(kind: impl Into<String>, quality: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            quality: Some(quality.into()),
        }
    }

    /// A nature matching every quality of `kind`.
    pub fn of_kind(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            quality: None,
        }
    }

    pub fn quality(&self) -> &str {
        self.quality.as_deref().unwrap_or("")
    }
}

impl fmt::Display for Nature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.quality {
            Some(q) => write!(f, "{}/{}", self.kind, q),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// One unit of intent travelling between components.
/// Wire: `{ "id": "msg-1", "nature": {...}, "payload": {...} }`
///
/// `id` is only present for commands consumed from a work queue; it is the
/// identifier the consumer must acknowledge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub nature: Nature,
    #[serde(default)]
    pub payload: Value,
}

impl Command {
    /// A command issued directly (HTTP, in-process), with nothing to acknowledge.
    pub fn direct(nature: Nature, payload: Value) -> Self {
        Self {
            id: None,
            nature,
            payload,
        }
    }

    /// A command consumed from a queue under the message id `ack_id`.
    pub fn queued(ack_id: impl Into<String>, nature: Nature, payload: Value) -> Self {
        Self {
            id: Some(ack_id.into()),
            nature,
            payload,
        }
    }
}

/// Terminal signal of a command: exactly one per dispatched context.
/// Wire: `{ "status": "done", "responder": "dblayer", "result": {...} }`
///       `{ "status": "reject", "responder": "dblayer", "error": "..." }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    /// Success. `result` is `null` when nothing matched.
    Done { responder: String, result: Value },
    /// Business-level refusal (bad input, conflicting state).
    Reject { responder: String, error: Value },
    /// Infrastructure failure (transport, store, timeout).
    Error { responder: String, error: Value },
}

impl Outcome {
    pub fn done(responder: impl Into<String>, result: impl Serialize) -> Self {
        Outcome::Done {
            responder: responder.into(),
            result: serde_json::to_value(result).unwrap_or(Value::Null),
        }
    }

    pub fn reject(responder: impl Into<String>, error: impl fmt::Display) -> Self {
        Outcome::Reject {
            responder: responder.into(),
            error: Value::String(error.to_string()),
        }
    }

    pub fn error(responder: impl Into<String>, error: impl fmt::Display) -> Self {
        Outcome::Error {
            responder: responder.into(),
            error: Value::String(error.to_string()),
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Outcome::Done { .. } => "done",
            Outcome::Reject { .. } => "reject",
            Outcome::Error { .. } => "error",
        }
    }

    pub fn responder(&self) -> &str {
        match self {
            Outcome::Done { responder, .. }
            | Outcome::Reject { responder, .. }
            | Outcome::Error { responder, .. } => responder,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done { .. })
    }
}
