pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::profile::LocalUserFields;
use crate::models::token::{AuthToken, NewAuthToken};
use crate::models::user::User;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Primary key already taken. Never resolved by overwriting.
    #[error("primary key conflict")]
    Conflict,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict,
            _ => StoreError::Backend(e.into()),
        }
    }
}

/// Persistence of API token records, keyed by digest.
/// Implementations: PgStore (PostgreSQL), MemoryStore (DashMap).
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Insert a new record. Must fail with `StoreError::Conflict` if the id exists.
    async fn create(&self, token: &NewAuthToken) -> Result<AuthToken, StoreError>;

    async fn find_by_key(&self, id: &str) -> Result<Option<AuthToken>, StoreError>;

    /// Returns whether a row was removed.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// Delete only if owned by `user_id`.
    async fn delete_owned(&self, id: &str, user_id: &str) -> Result<bool, StoreError>;

    /// Unexpired tokens of a user, newest first.
    async fn list_for_owner(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<AuthToken>, StoreError>;

    /// Remove every record with `expires_at <= now`. Returns the number removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Lookup of sign-in sessions written by the external auth layer.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// User id of the unexpired session with this token, if any.
    async fn find_session_user(
        &self,
        session_token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, id: &str) -> Result<Option<User>, StoreError>;

    /// Insert or update the user with this username. Returns the user id.
    async fn upsert_user(&self, fields: &LocalUserFields) -> Result<String, StoreError>;

    /// One page of users ordered by id. `name` is a case-insensitive
    /// substring filter.
    async fn list_users(
        &self,
        name: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<User>, StoreError>;
}
