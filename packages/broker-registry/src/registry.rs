// ABOUTME: Sandbox Registry — persistent mapping of sandbox id -> owning user -> container id
// ABOUTME: sqlx raw query/query_as over SQLite, following packages/sandbox's storage idiom

use broker_core::Sandbox;
use broker_driver::ContainerDriver;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{RegistryError, Result};

pub struct SandboxRegistry {
    pool: SqlitePool,
    driver: Arc<dyn ContainerDriver>,
}

impl SandboxRegistry {
    pub fn new(pool: SqlitePool, driver: Arc<dyn ContainerDriver>) -> Self {
        Self { pool, driver }
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sandboxes (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                container_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_used_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sandboxes_user_id ON sandboxes (user_id)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Mints a sandbox id, asks the Container Driver to create+start its
    /// container, and persists the pair atomically. If persistence fails
    /// after the container was created, the container is removed before
    /// returning the error — never leaves an orphaned container behind.
    pub async fn create(&self, user_id: &str, name: Option<String>) -> Result<Sandbox> {
        let id = format!("sbx_{}", Uuid::new_v4().simple());
        let name = name.unwrap_or_else(|| id.clone());

        let mut labels = HashMap::new();
        labels.insert("broker.sandbox_id".to_string(), id.clone());
        labels.insert("broker.user_id".to_string(), user_id.to_string());

        let container_id = self.driver.create_and_start(labels).await?;

        let now = Utc::now();
        let sandbox = Sandbox {
            id: id.clone(),
            user_id: user_id.to_string(),
            name,
            container_id: container_id.clone(),
            created_at: now,
            last_used_at: now,
        };

        if let Err(err) = self.insert(&sandbox).await {
            warn!(
                sandbox_id = %id,
                container_id = %container_id,
                error = %err,
                "persisting sandbox failed after container creation, rolling back container"
            );
            if let Err(cleanup_err) = self.driver.remove(&container_id, true).await {
                warn!(
                    container_id = %container_id,
                    error = %cleanup_err,
                    "failed to roll back orphaned container"
                );
            }
            return Err(err);
        }

        info!(sandbox_id = %id, container_id = %container_id, "sandbox created");
        Ok(sandbox)
    }

    async fn insert(&self, sandbox: &Sandbox) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sandboxes (id, user_id, name, container_id, created_at, last_used_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&sandbox.id)
        .bind(&sandbox.user_id)
        .bind(&sandbox.name)
        .bind(&sandbox.container_id)
        .bind(sandbox.created_at.to_rfc3339())
        .bind(sandbox.last_used_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_by_user(&self, user_id: &str) -> Result<Vec<Sandbox>> {
        let rows = sqlx::query("SELECT * FROM sandboxes WHERE user_id = ?1 ORDER BY created_at")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_sandbox).collect()
    }

    pub async fn get(&self, id: &str) -> Result<Sandbox> {
        let row = sqlx::query("SELECT * FROM sandboxes WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        row_to_sandbox(&row)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM sandboxes WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn touch(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE sandboxes SET last_used_at = ?1 WHERE id = ?2")
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Snapshot of every sandbox row, used by the Reaper at tick time.
    pub async fn list_all(&self) -> Result<Vec<Sandbox>> {
        let rows = sqlx::query("SELECT * FROM sandboxes")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_sandbox).collect()
    }
}

fn row_to_sandbox(row: &sqlx::sqlite::SqliteRow) -> Result<Sandbox> {
    let created_at_str: String = row.try_get("created_at")?;
    let last_used_at_str: String = row.try_get("last_used_at")?;
    Ok(Sandbox {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        container_id: row.try_get("container_id")?,
        created_at: parse_rfc3339(&created_at_str)?,
        last_used_at: parse_rfc3339(&last_used_at_str)?,
    })
}

fn parse_rfc3339(s: &str) -> Result<chrono::DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RegistryError::Database(sqlx::Error::Decode(Box::new(e))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker_driver::mock::MockDriver;

    async fn setup() -> SandboxRegistry {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        let driver: Arc<dyn ContainerDriver> = Arc::new(MockDriver::new());
        let registry = SandboxRegistry::new(pool, driver);
        registry.init_schema().await.unwrap();
        registry
    }

    #[tokio::test]
    async fn create_then_get_roundtrips() {
        let registry = setup().await;
        let sandbox = registry.create("usr_1", Some("my-box".to_string())).await.unwrap();
        let fetched = registry.get(&sandbox.id).await.unwrap();
        assert_eq!(fetched.id, sandbox.id);
        assert_eq!(fetched.user_id, "usr_1");
        assert_eq!(fetched.name, "my-box");
    }

    #[tokio::test]
    async fn list_by_user_only_returns_owned_sandboxes() {
        let registry = setup().await;
        registry.create("usr_1", None).await.unwrap();
        registry.create("usr_2", None).await.unwrap();
        let alice_sandboxes = registry.list_by_user("usr_1").await.unwrap();
        assert_eq!(alice_sandboxes.len(), 1);
        assert_eq!(alice_sandboxes[0].user_id, "usr_1");
    }

    #[tokio::test]
    async fn get_missing_sandbox_returns_not_found() {
        let registry = setup().await;
        let err = registry.get("sbx_does_not_exist").await.unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_removes_row() {
        let registry = setup().await;
        let sandbox = registry.create("usr_1", None).await.unwrap();
        registry.delete(&sandbox.id).await.unwrap();
        assert!(registry.get(&sandbox.id).await.is_err());
    }

    #[tokio::test]
    async fn touch_updates_last_used_at() {
        let registry = setup().await;
        let sandbox = registry.create("usr_1", None).await.unwrap();
        let original = sandbox.last_used_at;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        registry.touch(&sandbox.id).await.unwrap();
        let touched = registry.get(&sandbox.id).await.unwrap();
        assert!(touched.last_used_at >= original);
    }

    #[tokio::test]
    async fn no_two_sandboxes_share_a_container_id() {
        let registry = setup().await;
        let a = registry.create("usr_1", None).await.unwrap();
        let b = registry.create("usr_1", None).await.unwrap();
        assert_ne!(a.container_id, b.container_id);
    }
}
