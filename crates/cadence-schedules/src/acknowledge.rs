use cadence_messaging::{Broker, CommandContext, Failure};
use cadence_protocol::{natures, Command, Nature};
use serde_json::json;
use tracing::{debug, warn};

/// Confirm consumption of the queue message `command` came from, so the
/// transport stops redelivering it.
///
/// Resolves immediately when the command carries no acknowledgment id.
pub async fn acknowledge_message(broker: &Broker, command: &Command) -> Result<(), Failure> {
    let Some(ack_id) = command.id.as_deref() else {
        return Ok(());
    };

    let outcome = CommandContext::new(
        Nature::new(natures::MESSAGES, natures::ACKNOWLEDGE),
        json!({ "id": ack_id }),
    )
    .publish(broker)
    .outcome()
    .await;

    match Failure::check(outcome) {
        Ok(_) => {
            debug!(message_id = %ack_id, nature = %command.nature, "message acknowledged");
            Ok(())
        }
        Err(failure) => {
            warn!(message_id = %ack_id, %failure, "cannot acknowledge message");
            Err(failure)
        }
    }
}
