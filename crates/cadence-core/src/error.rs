use thiserror::Error;

#[derive(Debug, Error)]
pub enum CadenceError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller supplied malformed or missing input. Never retried.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A downstream responder explicitly refused the operation.
    #[error("Rejected by {responder}: {reason}")]
    Rejected { responder: String, reason: String },

    /// Transport or store failure reported by a downstream responder.
    #[error("Infrastructure failure in {responder}: {reason}")]
    Infrastructure { responder: String, reason: String },

    #[error("Command timed out after {ms}ms")]
    Timeout { ms: u64 },
}

impl CadenceError {
    /// Short error code string sent to clients in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            CadenceError::Config(_) => "CONFIG_ERROR",
            CadenceError::Validation(_) => "VALIDATION_ERROR",
            CadenceError::Rejected { .. } => "REJECTED",
            CadenceError::Infrastructure { .. } => "INFRASTRUCTURE_ERROR",
            CadenceError::Timeout { .. } => "TIMEOUT",
        }
    }

    /// Whether the failure is the caller's fault (reported as a rejection)
    /// rather than an infrastructure problem.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            CadenceError::Validation(_) | CadenceError::Rejected { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CadenceError>;
