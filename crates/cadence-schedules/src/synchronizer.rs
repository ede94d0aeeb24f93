use cadence_messaging::{Broker, CommandContext, Failure};
use cadence_protocol::{natures, Nature, SyncKind, SyncMessage};
use serde_json::Value;
use tracing::{debug, error};

/// Publish a successful local mutation on the synchronization topic so peer
/// instances converge on the same entity.
///
/// `origin` tags the message so the publishing instance can recognize its
/// own broadcast when the topic hands it back.
///
/// Failure does not undo the local write; the caller decides how to report it.
pub async fn broadcast(
    broker: &Broker,
    origin: &str,
    kind: SyncKind,
    entity: &Value,
) -> Result<(), Failure> {
    let message = SyncMessage {
        operation_kind: kind,
        entity: entity.clone(),
        origin: Some(origin.to_string()),
    };
    let payload = serde_json::to_value(&message)
        .map_err(|e| Failure::error(natures::SYNCHRONIZE, e))?;

    let outcome = CommandContext::new(Nature::new(natures::MESSAGES, natures::PUBLISH), payload)
        .publish(broker)
        .outcome()
        .await;

    match Failure::check(outcome) {
        Ok(_) => {
            debug!(%kind, id = %entity["id"], "schedule broadcast");
            Ok(())
        }
        Err(failure) => {
            error!(%kind, id = %entity["id"], %failure, "cannot broadcast schedule");
            Err(failure)
        }
    }
}
