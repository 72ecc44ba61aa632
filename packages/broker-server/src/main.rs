// ABOUTME: broker-server binary — wires every broker component and serves the HTTP surface
// ABOUTME: bootstrap follows packages/projects/src/db.rs's pool setup + packages/cli's env/CORS wiring

use std::str::FromStr;
use std::sync::Arc;

use broker_coordinator::Coordinator;
use broker_core::BrokerConfig;
use broker_driver::{docker::DockerDriver, ContainerDriver};
use broker_files::FilePublisher;
use broker_identity::IdentityStore;
use broker_mcp::McpSessionRegistry;
use broker_reaper::Reaper;
use broker_registry::SandboxRegistry;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = BrokerConfig::from_env();
    info!(config = ?config.redacted(), "starting broker-server");

    let pool = connect_pool(&config.persist_path).await?;

    let identity = Arc::new(IdentityStore::new(pool.clone()));
    identity.init_schema().await?;

    let driver: Arc<dyn ContainerDriver> = Arc::new(DockerDriver::new(config.base_image.clone())?);

    let registry = Arc::new(SandboxRegistry::new(pool.clone(), driver.clone()));
    registry.init_schema().await?;

    let files = Arc::new(FilePublisher::new(
        config.results_root.clone(),
        config.file_ttl,
    ));

    let coordinator = Arc::new(Coordinator::new(
        registry.clone(),
        driver.clone(),
        files.clone(),
        config.exec_timeout,
    ));

    let reaper = Arc::new(Reaper::new(
        registry,
        driver,
        files.clone(),
        coordinator.clone(),
        config.inactivity_threshold,
        config.reaper_interval,
    ));
    reaper.reconcile_on_startup().await?;
    reaper.start().await;

    let state = broker_api::AppState {
        identity,
        coordinator,
        files,
        mcp_sessions: Arc::new(McpSessionRegistry::new()),
        config: config.clone(),
        sse_tracker: broker_api::sse::SseConnectionTracker::new(),
    };

    let app = broker_api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}

async fn connect_pool(persist_path: &str) -> anyhow::Result<sqlx::SqlitePool> {
    if let Some(parent) = std::path::Path::new(persist_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{persist_path}"))?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    sqlx::query("PRAGMA synchronous = NORMAL").execute(&pool).await?;

    Ok(pool)
}
