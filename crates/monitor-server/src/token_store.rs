//! # Admin token store
//!
//! The admin credential used to open the event channel lives in a single-row
//! `admin_tokens` table. It is usable only while both the access token and
//! its refresh token are unexpired.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::{debug, error, warn};
use xsi_monitor_core::{TokenProvider, TokenStatus};

use crate::error::Result;

const CREATE_ADMIN_TOKENS: &str = "CREATE TABLE IF NOT EXISTS admin_tokens (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    access_token TEXT NOT NULL,
    refresh_token TEXT,
    access_expires_at TEXT NOT NULL,
    refresh_expires_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)";

/// Stored admin credential
#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct AdminToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

impl AdminToken {
    pub fn is_token_expired(&self, now: DateTime<Utc>) -> bool {
        self.access_expires_at <= now
    }

    pub fn is_refresh_token_expired(&self, now: DateTime<Utc>) -> bool {
        self.refresh_expires_at <= now
    }
}

/// SQLite-backed [`TokenProvider`]
#[derive(Clone, Debug)]
pub struct SqliteTokenStore {
    pool: SqlitePool,
}

impl SqliteTokenStore {
    /// Open the database and create the token table if needed
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(CREATE_ADMIN_TOKENS).execute(&pool).await?;
        debug!("admin_tokens table ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert or replace the admin credential
    pub async fn store_token(&self, token: &AdminToken) -> Result<()> {
        sqlx::query(
            "INSERT INTO admin_tokens
                (id, access_token, refresh_token, access_expires_at, refresh_expires_at, updated_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                access_expires_at = excluded.access_expires_at,
                refresh_expires_at = excluded.refresh_expires_at,
                updated_at = excluded.updated_at",
        )
        .bind(&token.access_token)
        .bind(&token.refresh_token)
        .bind(token.access_expires_at)
        .bind(token.refresh_expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn read_admin_token(&self) -> Result<Option<AdminToken>> {
        let token = sqlx::query_as::<_, AdminToken>(
            "SELECT access_token, refresh_token, access_expires_at, refresh_expires_at
             FROM admin_tokens WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(token)
    }
}

#[async_trait]
impl TokenProvider for SqliteTokenStore {
    async fn validate_and_fetch_token(&self) -> TokenStatus {
        let now = Utc::now();
        match self.read_admin_token().await {
            Ok(Some(token))
                if !token.is_token_expired(now) && !token.is_refresh_token_expired(now) =>
            {
                TokenStatus::Valid(token.access_token)
            }
            Ok(Some(_)) => {
                warn!("Stored admin token has expired");
                TokenStatus::Invalid
            }
            Ok(None) => {
                warn!("No admin token stored");
                TokenStatus::Invalid
            }
            Err(e) => {
                error!("Error accessing admin token: {}", e);
                TokenStatus::Invalid
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn memory_store() -> SqliteTokenStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteTokenStore::from_pool(pool).await.unwrap()
    }

    fn token(access_in: Duration, refresh_in: Duration) -> AdminToken {
        let now = Utc::now();
        AdminToken {
            access_token: "admin-access".to_string(),
            refresh_token: Some("admin-refresh".to_string()),
            access_expires_at: now + access_in,
            refresh_expires_at: now + refresh_in,
        }
    }

    #[tokio::test]
    async fn test_empty_store_is_invalid() {
        let store = memory_store().await;
        assert_eq!(store.validate_and_fetch_token().await, TokenStatus::Invalid);
    }

    #[tokio::test]
    async fn test_fresh_token_is_valid() {
        let store = memory_store().await;
        store
            .store_token(&token(Duration::hours(1), Duration::days(14)))
            .await
            .unwrap();

        assert_eq!(
            store.validate_and_fetch_token().await,
            TokenStatus::Valid("admin-access".to_string())
        );
    }

    #[tokio::test]
    async fn test_either_expiry_invalidates() {
        let store = memory_store().await;

        store
            .store_token(&token(Duration::hours(-1), Duration::days(14)))
            .await
            .unwrap();
        assert_eq!(store.validate_and_fetch_token().await, TokenStatus::Invalid);

        store
            .store_token(&token(Duration::hours(1), Duration::seconds(-5)))
            .await
            .unwrap();
        assert_eq!(store.validate_and_fetch_token().await, TokenStatus::Invalid);
    }

    #[tokio::test]
    async fn test_store_replaces_single_row() {
        let store = memory_store().await;
        let mut first = token(Duration::hours(1), Duration::days(1));
        store.store_token(&first).await.unwrap();
        first.access_token = "rotated".to_string();
        store.store_token(&first).await.unwrap();

        let stored = store.read_admin_token().await.unwrap().unwrap();
        assert_eq!(stored.access_token, "rotated");
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM admin_tokens")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_database_error_degrades_to_invalid() {
        let store = memory_store().await;
        sqlx::query("DROP TABLE admin_tokens")
            .execute(store.pool())
            .await
            .unwrap();
        assert_eq!(store.validate_and_fetch_token().await, TokenStatus::Invalid);
    }
}
