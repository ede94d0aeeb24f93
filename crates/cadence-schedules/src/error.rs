use cadence_messaging::Failure;
use cadence_protocol::Outcome;
use thiserror::Error;

/// Caller supplied malformed or missing input. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing payload")]
    MissingPayload,

    #[error("incorrect '{field}' in job payload: {cause}")]
    Field { field: String, cause: String },
}

impl ValidationError {
    pub fn field(field: impl Into<String>, cause: impl Into<String>) -> Self {
        ValidationError::Field {
            field: field.into(),
            cause: cause.into(),
        }
    }

    /// Name of the offending field, if the failure concerns one.
    pub fn field_name(&self) -> Option<&str> {
        match self {
            ValidationError::MissingPayload => None,
            ValidationError::Field { field, .. } => Some(field),
        }
    }
}

/// Errors that can end a schedules operation.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A downstream command (acknowledge, persistence, broadcast) failed.
    #[error(transparent)]
    Downstream(#[from] Failure),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ScheduleError {
    /// Turn the error into the caller-visible outcome. Downstream failures
    /// keep their kind, responder and payload untouched.
    pub fn into_outcome(self, responder: &str) -> Outcome {
        match self {
            ScheduleError::Validation(e) => Outcome::reject(responder, e),
            ScheduleError::Downstream(failure) => failure.into_outcome(),
            ScheduleError::Serialization(e) => Outcome::error(responder, e),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScheduleError>;
