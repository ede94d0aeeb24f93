pub mod broker;
pub mod context;
pub mod error;
pub mod messages;
pub mod queue;
pub mod responder;

pub use broker::{Broker, Topics};
pub use context::{CommandContext, Delivery, Pending, Reply};
pub use error::{MessagingError, Result};
pub use messages::MessagesResponder;
pub use queue::{QueueMessage, Queues};
pub use responder::{Failure, FailureKind, Responder};
