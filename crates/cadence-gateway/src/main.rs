use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

mod app;
mod http;
mod receivers;

/// Schedule data service: REST and queue front ends over the schedules
/// command pipeline, synchronized with peer instances.
#[derive(Debug, Parser)]
#[command(name = "cadence-gateway", version, about)]
struct Cli {
    /// Config file (defaults to ~/.cadence/cadence.toml).
    #[arg(long, env = "CADENCE_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cadence_gateway=info,cadence_schedules=info,tower_http=debug".into()
            }),
        )
        .init();

    let cli = Cli::parse();
    let config = cadence_core::CadenceConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        cadence_core::CadenceConfig::default()
    });

    let bind = config.http.bind.clone();
    let port = config.http.port;

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");
    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL;")?;

    let broker = app::wire(&config, db)?;

    receivers::spawn_queue_consumer(Arc::clone(&broker), &config.messaging.queue)?;
    receivers::spawn_sync_receiver(Arc::clone(&broker), &config.messaging.sync_topic);
    if config.messaging.redelivery_ms > 0 {
        receivers::spawn_redelivery(
            Arc::clone(&broker),
            Duration::from_millis(config.messaging.redelivery_ms),
        );
    }

    let state = Arc::new(app::AppState::new(config, broker));
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!("Cadence gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
