// ABOUTME: Tracks live MCP sessions, keyed by session id
// ABOUTME: grounded on the session-map half of a persistent-session manager; no idle reaper here —
// ABOUTME: session lifetime is orthogonal to sandbox lifetime, so sessions are only ever removed explicitly

use std::collections::HashMap;
use std::sync::Arc;

use broker_coordinator::Coordinator;
use broker_identity::store::IdentityStore;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::session::McpSession;

/// Registry of connected MCP sessions. One per running server.
pub struct McpSessionRegistry {
    sessions: RwLock<HashMap<String, Arc<McpSession>>>,
}

impl Default for McpSessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl McpSessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve the connecting client's api key to a user, mint a session
    /// bound to that identity, and track it. This is the only place a
    /// session's user identity is ever decided.
    pub async fn connect(
        &self,
        api_key: &str,
        identity: &IdentityStore,
        coordinator: Arc<Coordinator>,
    ) -> broker_core::Result<Arc<McpSession>> {
        let user = identity.resolve_api_key(api_key).await?;
        let session = Arc::new(McpSession::new(user, coordinator));
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), Arc::clone(&session));
        info!(session = %session.id, user_id = %session.user.id, "mcp session connected");
        Ok(session)
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<McpSession>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Drop a session when its connection closes. Does not touch sandboxes —
    /// sandbox lifetime is managed entirely by the Reaper.
    pub async fn disconnect(&self, session_id: &str) {
        if self.sessions.write().await.remove(session_id).is_some() {
            info!(session = %session_id, "mcp session disconnected");
        } else {
            warn!(session = %session_id, "disconnect of unknown mcp session");
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker_driver::mock::MockDriver;
    use broker_driver::ContainerDriver;
    use broker_files::FilePublisher;
    use broker_registry::SandboxRegistry;
    use sqlx::SqlitePool;
    use std::time::Duration;

    async fn setup() -> (McpSessionRegistry, IdentityStore, Arc<Coordinator>, tempfile::TempDir) {
        let identity_pool = SqlitePool::connect(":memory:").await.unwrap();
        let identity = IdentityStore::new(identity_pool);
        identity.init_schema().await.unwrap();

        let registry_pool = SqlitePool::connect(":memory:").await.unwrap();
        let driver = Arc::new(MockDriver::new());
        let registry = Arc::new(SandboxRegistry::new(registry_pool, driver.clone()));
        registry.init_schema().await.unwrap();
        let results_root = tempfile::tempdir().unwrap();
        let files = Arc::new(FilePublisher::new(
            results_root.path(),
            Duration::from_secs(3600),
        ));
        let coordinator = Arc::new(Coordinator::new(
            registry,
            driver as Arc<dyn ContainerDriver>,
            files,
            Duration::from_secs(5),
        ));

        (McpSessionRegistry::new(), identity, coordinator, results_root)
    }

    #[tokio::test]
    async fn connect_with_a_valid_api_key_binds_the_session_to_that_user() {
        let (sessions, identity, coordinator, _tmp) = setup().await;
        let user = identity
            .register("alice", "alice@example.com", "password123")
            .await
            .unwrap();

        let session = sessions
            .connect(&user.api_key, &identity, coordinator)
            .await
            .unwrap();

        assert_eq!(session.user.id, user.id);
        assert_eq!(sessions.len().await, 1);
        assert!(sessions.get(&session.id).await.is_some());
    }

    #[tokio::test]
    async fn connect_with_an_unknown_api_key_is_rejected() {
        let (sessions, identity, coordinator, _tmp) = setup().await;
        let err = sessions
            .connect("not-a-real-key", &identity, coordinator)
            .await
            .unwrap_err();
        assert!(matches!(err, broker_core::BrokerError::NotAuthorized));
    }

    #[tokio::test]
    async fn disconnect_removes_the_session() {
        let (sessions, identity, coordinator, _tmp) = setup().await;
        let user = identity
            .register("bob", "bob@example.com", "password123")
            .await
            .unwrap();
        let session = sessions
            .connect(&user.api_key, &identity, coordinator)
            .await
            .unwrap();

        sessions.disconnect(&session.id).await;
        assert_eq!(sessions.len().await, 0);
        assert!(sessions.get(&session.id).await.is_none());
    }
}
