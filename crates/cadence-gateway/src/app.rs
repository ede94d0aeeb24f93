use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use cadence_core::config::CadenceConfig;
use cadence_messaging::{Broker, MessagesResponder};
use cadence_protocol::{natures, Nature};
use cadence_schedules::ScheduleService;
use cadence_store::{DbInterface, DocumentStore};
use rusqlite::Connection;
use tracing::info;

use crate::http::{health, schedules};

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: CadenceConfig,
    pub broker: Arc<Broker>,
}

impl AppState {
    pub fn new(config: CadenceConfig, broker: Arc<Broker>) -> Self {
        Self { config, broker }
    }
}

/// Build the broker and register every responder of this instance:
/// `dbinterface` over the SQLite document store, `messages` for
/// acknowledgements and synchronization publishes, `schedules` for the
/// business logic. Also declares the work queue.
pub fn wire(config: &CadenceConfig, conn: Connection) -> anyhow::Result<Arc<Broker>> {
    let store = Arc::new(DocumentStore::new(conn)?);
    let broker = Arc::new(Broker::new(config.messaging.command_timeout()));
    broker.queues().declare(&config.messaging.queue);

    broker.route(
        Nature::of_kind(natures::DBINTERFACE),
        Arc::new(DbInterface::new(store)),
    );
    broker.route(
        Nature::of_kind(natures::MESSAGES),
        Arc::new(MessagesResponder::new(
            natures::MESSAGES,
            broker.topics().clone(),
            broker.queues().clone(),
            &config.messaging.sync_topic,
        )),
    );
    broker.route(
        Nature::of_kind(natures::SCHEDULES),
        Arc::new(ScheduleService::new(
            &config.instance.name,
            &config.database.collection,
            &broker,
        )),
    );
    info!(instance = %config.instance.name, "responders registered");
    Ok(broker)
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Clients use both `objid` and `objId` in the compound-key paths.
    let by_obj_id_type = get(schedules::find_by_obj_id_type)
        .post(schedules::upsert_by_obj_id_type)
        .patch(schedules::update_by_obj_id_type)
        .delete(schedules::delete_by_obj_id_type);

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/schedules", post(schedules::create).get(schedules::find))
        .route(
            "/schedules/{id}",
            get(schedules::find_by_id)
                .put(schedules::replace)
                .patch(schedules::update)
                .delete(schedules::delete),
        )
        .route("/schedules/objid/{obj_id}/type/{obj_type}", by_obj_id_type.clone())
        .route("/schedules/objId/{obj_id}/type/{obj_type}", by_obj_id_type)
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
