// ABOUTME: Shared AppState-builder for handler/middleware tests, mirroring the one in auth.rs

use std::sync::Arc;
use std::time::Duration;

use broker_coordinator::Coordinator;
use broker_driver::mock::MockDriver;
use broker_driver::ContainerDriver;
use broker_files::FilePublisher;
use broker_identity::IdentityStore;
use broker_mcp::McpSessionRegistry;
use broker_registry::SandboxRegistry;
use sqlx::SqlitePool;

use crate::sse::SseConnectionTracker;
use crate::state::AppState;

pub async fn test_state() -> (AppState, tempfile::TempDir) {
    let identity_pool = SqlitePool::connect(":memory:").await.unwrap();
    let identity = Arc::new(IdentityStore::new(identity_pool));
    identity.init_schema().await.unwrap();

    let registry_pool = SqlitePool::connect(":memory:").await.unwrap();
    let driver = Arc::new(MockDriver::new());
    let registry = Arc::new(SandboxRegistry::new(registry_pool, driver.clone()));
    registry.init_schema().await.unwrap();
    let tmp = tempfile::tempdir().unwrap();
    let files = Arc::new(FilePublisher::new(tmp.path(), Duration::from_secs(3600)));
    let coordinator = Arc::new(Coordinator::new(
        registry,
        driver as Arc<dyn ContainerDriver>,
        files.clone(),
        Duration::from_secs(5),
    ));

    let mut config = broker_core::BrokerConfig::from_env();
    config.session_signing_key = "test-signing-key".to_string();

    let state = AppState {
        identity,
        coordinator,
        files,
        mcp_sessions: Arc::new(McpSessionRegistry::new()),
        config,
        sse_tracker: SseConnectionTracker::new(),
    };
    (state, tmp)
}
