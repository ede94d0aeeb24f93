use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The query itself is malformed; retrying it cannot succeed.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("document has no string 'id'")]
    MissingId,
}

impl StoreError {
    /// Caller-side mistakes are rejections; everything else is infrastructure.
    pub fn is_rejection(&self) -> bool {
        matches!(self, StoreError::InvalidQuery(_) | StoreError::MissingId)
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
