use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use super::{SessionStore, StoreError, TokenStore, UserStore};
use crate::models::profile::LocalUserFields;
use crate::models::token::{AuthToken, NewAuthToken};
use crate::models::user::User;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .max_lifetime(Duration::from_secs(3600))
            .idle_timeout(Duration::from_secs(30 * 60))
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// -- Token Operations --

#[async_trait]
impl TokenStore for PgStore {
    async fn create(&self, token: &NewAuthToken) -> Result<AuthToken, StoreError> {
        // Plain INSERT: a duplicate id must surface as a unique violation.
        let row = sqlx::query_as::<_, AuthToken>(
            r#"INSERT INTO auth_tokens (id, user_id, expires_at)
               VALUES ($1, $2, $3)
               RETURNING id, user_id, expires_at, created_at"#,
        )
        .bind(&token.id)
        .bind(&token.user_id)
        .bind(token.expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_by_key(&self, id: &str) -> Result<Option<AuthToken>, StoreError> {
        let row = sqlx::query_as::<_, AuthToken>(
            "SELECT id, user_id, expires_at, created_at FROM auth_tokens WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_owned(&self, id: &str, user_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_for_owner(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<AuthToken>, StoreError> {
        let rows = sqlx::query_as::<_, AuthToken>(
            r#"SELECT id, user_id, expires_at, created_at
               FROM auth_tokens
               WHERE user_id = $1 AND expires_at > $2
               ORDER BY created_at DESC"#,
        )
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

// -- Session Operations --

#[async_trait]
impl SessionStore for PgStore {
    async fn find_session_user(
        &self,
        session_token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, StoreError> {
        let user_id = sqlx::query_scalar::<_, String>(
            r#"SELECT user_id
               FROM sessions
               WHERE session_token = $1
                 AND expires > $2"#,
        )
        .bind(session_token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user_id)
    }
}

// -- User Operations --

#[async_trait]
impl UserStore for PgStore {
    async fn find_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, User>(
            "SELECT id, name, email, image, username FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn upsert_user(&self, fields: &LocalUserFields) -> Result<String, StoreError> {
        let id = sqlx::query_scalar::<_, String>(
            r#"INSERT INTO users (id, name, email, image, username)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (username) DO UPDATE
                   SET name  = EXCLUDED.name,
                       email = EXCLUDED.email,
                       image = EXCLUDED.image
               RETURNING id"#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&fields.name)
        .bind(&fields.email)
        .bind(&fields.image)
        .bind(&fields.username)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn list_users(
        &self,
        name: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, User>(
            r#"SELECT id, name, email, image, username
               FROM users
               WHERE ($1::text IS NULL OR name ILIKE $1)
               ORDER BY id
               LIMIT $2 OFFSET $3"#,
        )
        .bind(name.map(|n| format!("%{}%", n)))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
