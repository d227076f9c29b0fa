use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sensor_uplink_api::ingest::Ingestor;
use sensor_uplink_api::models::FormatVersion;
use sensor_uplink_api::query::QueryService;
use sensor_uplink_api::routes::create_router;
use sensor_uplink_api::store::{PgStore, Store};
use sensor_uplink_api::uplink;
use sensor_uplink_api::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let cfg_path =
        std::env::var("APP_CONFIG").unwrap_or_else(|_| "config/config.example.yaml".into());
    let cfg = Config::load(&cfg_path)?;
    info!(
        v1 = cfg.uplink.v1_port,
        v2 = cfg.uplink.v2_port,
        v3 = cfg.uplink.v3_port,
        http = cfg.server.port,
        "loaded config"
    );

    let store: Arc<dyn Store> = Arc::new(PgStore::connect(&cfg.database).await?);
    info!("connected to database");

    let ingestor = Arc::new(Ingestor::new(
        store.clone(),
        cfg.platform.default_coordinator_id.clone(),
    ));
    let read_timeout = Duration::from_secs(cfg.uplink.read_timeout_secs);

    for (version, port) in [
        (FormatVersion::V1, cfg.uplink.v1_port),
        (FormatVersion::V2, cfg.uplink.v2_port),
        (FormatVersion::V3, cfg.uplink.v3_port),
    ] {
        let listener = TcpListener::bind((cfg.server.bind.as_str(), port)).await?;
        tokio::spawn(uplink::serve(
            listener,
            version,
            ingestor.clone(),
            read_timeout,
        ));
    }

    let app = create_router(QueryService::new(store));

    let bind_addr = format!("{}:{}", cfg.server.bind, cfg.server.port);
    info!("starting API server on {bind_addr}");
    let listener = TcpListener::bind(&bind_addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
