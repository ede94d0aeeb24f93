use async_trait::async_trait;
use cadence_protocol::{Command, Outcome};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Anything registered on the [`Broker`](crate::broker::Broker) to serve a nature.
///
/// Implementations must be `Send + Sync`: the broker drives every delivery on
/// its own Tokio task, so one responder serves many commands concurrently.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Name reported as the responder of every outcome this instance produces.
    fn name(&self) -> &str;

    /// Serve one command. The returned outcome is the command's single
    /// terminal signal.
    async fn respond(&self, command: Command) -> Outcome;
}

/// Which failure path an outcome took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Reject,
    Error,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Reject => write!(f, "reject"),
            FailureKind::Error => write!(f, "error"),
        }
    }
}

/// Structured `{kind, responder, payload}` triple of a failed command.
///
/// Carries the downstream payload untouched so it can be re-surfaced to the
/// original caller without changing its kind.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{kind} from {responder}: {payload}")]
pub struct Failure {
    pub kind: FailureKind,
    pub responder: String,
    pub payload: Value,
}

impl Failure {
    pub fn reject(responder: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self {
            kind: FailureKind::Reject,
            responder: responder.into(),
            payload: Value::String(error.to_string()),
        }
    }

    pub fn error(responder: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self {
            kind: FailureKind::Error,
            responder: responder.into(),
            payload: Value::String(error.to_string()),
        }
    }

    /// Split an outcome into `(responder, result)` or its failure triple.
    pub fn check(outcome: Outcome) -> Result<(String, Value), Failure> {
        match outcome {
            Outcome::Done { responder, result } => Ok((responder, result)),
            Outcome::Reject { responder, error } => Err(Failure {
                kind: FailureKind::Reject,
                responder,
                payload: error,
            }),
            Outcome::Error { responder, error } => Err(Failure {
                kind: FailureKind::Error,
                responder,
                payload: error,
            }),
        }
    }

    pub fn into_outcome(self) -> Outcome {
        match self.kind {
            FailureKind::Reject => Outcome::Reject {
                responder: self.responder,
                error: self.payload,
            },
            FailureKind::Error => Outcome::Error {
                responder: self.responder,
                error: self.payload,
            },
        }
    }
}

impl From<Failure> for Outcome {
    fn from(failure: Failure) -> Self {
        failure.into_outcome()
    }
}
