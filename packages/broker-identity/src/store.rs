// ABOUTME: Identity Store — persists users, resolves bearer tokens and API keys to identities
// ABOUTME: sqlx raw query/query_as over SQLite, following packages/sandbox's storage idiom

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use broker_core::User;
use chrono::Utc;
use rand::RngCore;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::{IdentityError, Result};
use crate::password::{hash_password, verify_password as check_password};
use crate::token;

pub struct IdentityStore {
    pool: SqlitePool,
}

impl IdentityStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                api_key TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<User> {
        if self.find_by_username(username).await?.is_some() {
            return Err(IdentityError::DuplicateUsername);
        }
        if self.find_by_email(email).await?.is_some() {
            return Err(IdentityError::DuplicateEmail);
        }

        let password_hash = hash_password(password)?;
        let user = User {
            id: format!("usr_{}", Uuid::new_v4().to_string().replace('-', "")),
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            api_key: generate_api_key(),
            created_at: Utc::now(),
            is_active: true,
        };

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, api_key, created_at, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.api_key)
        .bind(user.created_at.to_rfc3339())
        .bind(user.is_active)
        .execute(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn verify_password(&self, username: &str, password: &str) -> Result<User> {
        let user = self
            .find_by_username(username)
            .await?
            .ok_or(IdentityError::InvalidCredentials)?;
        if !check_password(password, &user.password_hash) {
            return Err(IdentityError::InvalidCredentials);
        }
        Ok(user)
    }

    pub async fn resolve_token(&self, bearer: &str, signing_key: &str) -> Result<User> {
        let user_id = token::resolve(bearer, signing_key)?;
        self.get(&user_id).await.map_err(|_| IdentityError::InvalidToken)
    }

    pub async fn resolve_api_key(&self, key: &str) -> Result<User> {
        self.find_by_api_key(key)
            .await?
            .ok_or(IdentityError::InvalidKey)
    }

    pub async fn regenerate_api_key(&self, user: &User) -> Result<String> {
        let new_key = generate_api_key();
        sqlx::query("UPDATE users SET api_key = ?1 WHERE id = ?2")
            .bind(&new_key)
            .bind(&user.id)
            .execute(&self.pool)
            .await?;
        Ok(new_key)
    }

    pub async fn get(&self, id: &str) -> Result<User> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(IdentityError::NotFound)?;
        row_to_user(&row)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE username = ?1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_user(&r)).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_user(&r)).transpose()
    }

    async fn find_by_api_key(&self, key: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE api_key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_user(&r)).transpose()
    }
}

/// 32 bytes of OS entropy, base64url-encoded (43 chars, no padding).
fn generate_api_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let created_at_str: String = row.try_get("created_at")?;
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        api_key: row.try_get("api_key")?,
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| IdentityError::Database(sqlx::Error::Decode(Box::new(e))))?,
        is_active: row.try_get::<i64, _>("is_active")? != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> IdentityStore {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        let store = IdentityStore::new(pool);
        store.init_schema().await.unwrap();
        store
    }

    #[tokio::test]
    async fn register_then_verify_password() {
        let store = setup().await;
        let user = store
            .register("alice", "alice@example.com", "password123")
            .await
            .unwrap();
        assert_eq!(user.username, "alice");

        let verified = store.verify_password("alice", "password123").await.unwrap();
        assert_eq!(verified.id, user.id);
    }

    #[tokio::test]
    async fn verify_password_rejects_wrong_password() {
        let store = setup().await;
        store
            .register("alice", "alice@example.com", "password123")
            .await
            .unwrap();
        let err = store.verify_password("alice", "wrong").await.unwrap_err();
        assert!(matches!(err, IdentityError::InvalidCredentials));
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let store = setup().await;
        store
            .register("alice", "alice@example.com", "password123")
            .await
            .unwrap();
        let err = store
            .register("alice", "other@example.com", "password456")
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::DuplicateUsername));
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = setup().await;
        store
            .register("alice", "alice@example.com", "password123")
            .await
            .unwrap();
        let err = store
            .register("bob", "alice@example.com", "password456")
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::DuplicateEmail));
    }

    #[tokio::test]
    async fn resolve_api_key_roundtrip() {
        let store = setup().await;
        let user = store
            .register("alice", "alice@example.com", "password123")
            .await
            .unwrap();
        let resolved = store.resolve_api_key(&user.api_key).await.unwrap();
        assert_eq!(resolved.id, user.id);
    }

    #[tokio::test]
    async fn regenerate_api_key_invalidates_old_key() {
        let store = setup().await;
        let user = store
            .register("alice", "alice@example.com", "password123")
            .await
            .unwrap();
        let old_key = user.api_key.clone();
        let new_key = store.regenerate_api_key(&user).await.unwrap();
        assert_ne!(old_key, new_key);
        assert!(store.resolve_api_key(&old_key).await.is_err());
        assert!(store.resolve_api_key(&new_key).await.is_ok());
    }

    #[tokio::test]
    async fn resolve_token_roundtrip() {
        let store = setup().await;
        let user = store
            .register("alice", "alice@example.com", "password123")
            .await
            .unwrap();
        let signing_key = "test-signing-key";
        let session_token = token::issue(&user.id, signing_key);
        let resolved = store.resolve_token(&session_token, signing_key).await.unwrap();
        assert_eq!(resolved.id, user.id);
    }
}
