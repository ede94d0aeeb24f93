use thiserror::Error;

/// Errors raised by the in-process broker itself. Responder failures never
/// surface here; they travel as [`Outcome`](cadence_protocol::Outcome)s.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// No queue with this name has been declared.
    #[error("Queue not found: {name}")]
    QueueNotFound { name: String },

    /// The queue already handed its receiver to another consumer.
    #[error("Queue already consumed: {name}")]
    AlreadyConsumed { name: String },

    /// Acknowledgement for a message that is not (or no longer) in flight.
    #[error("Unknown message: {id}")]
    UnknownMessage { id: String },

    /// The consuming side of a queue has gone away.
    #[error("Queue closed: {name}")]
    Closed { name: String },
}

pub type Result<T> = std::result::Result<T, MessagingError>;
