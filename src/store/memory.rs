//! In-process store backed by `DashMap`.
//!
//! Used by the test suite and by `serve --in-memory` for local development.
//! Mirrors the Postgres semantics: inserts never overwrite, expiry is
//! compared against the caller-supplied clock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::{SessionStore, StoreError, TokenStore, UserStore};
use crate::models::profile::LocalUserFields;
use crate::models::token::{AuthToken, NewAuthToken};
use crate::models::user::User;

#[derive(Clone)]
struct SessionEntry {
    user_id: String,
    expires: DateTime<Utc>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tokens: Arc<DashMap<String, AuthToken>>,
    sessions: Arc<DashMap<String, SessionEntry>>,
    users: Arc<DashMap<String, User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session as the external auth layer would.
    pub fn insert_session(&self, session_token: &str, user_id: &str, expires: DateTime<Utc>) {
        self.sessions.insert(
            session_token.to_string(),
            SessionEntry {
                user_id: user_id.to_string(),
                expires,
            },
        );
    }

    pub fn insert_user(&self, user: User) {
        self.users.insert(user.id.clone(), user);
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Copy of every stored token record.
    pub fn tokens(&self) -> Vec<AuthToken> {
        self.tokens.iter().map(|e| e.value().clone()).collect()
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn create(&self, token: &NewAuthToken) -> Result<AuthToken, StoreError> {
        match self.tokens.entry(token.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict),
            Entry::Vacant(slot) => {
                let row = AuthToken {
                    id: token.id.clone(),
                    user_id: token.user_id.clone(),
                    expires_at: token.expires_at,
                    created_at: Utc::now(),
                };
                slot.insert(row.clone());
                Ok(row)
            }
        }
    }

    async fn find_by_key(&self, id: &str) -> Result<Option<AuthToken>, StoreError> {
        Ok(self.tokens.get(id).map(|e| e.value().clone()))
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.tokens.remove(id).is_some())
    }

    async fn delete_owned(&self, id: &str, user_id: &str) -> Result<bool, StoreError> {
        Ok(self
            .tokens
            .remove_if(id, |_, t| t.user_id == user_id)
            .is_some())
    }

    async fn list_for_owner(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<AuthToken>, StoreError> {
        let mut rows: Vec<AuthToken> = self
            .tokens
            .iter()
            .filter(|e| e.user_id == user_id && !e.is_expired_at(now))
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        // Counted per removal: inserts may land while retain walks the shards.
        let mut removed = 0u64;
        self.tokens.retain(|_, t| {
            let keep = !t.is_expired_at(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn find_session_user(
        &self,
        session_token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, StoreError> {
        Ok(self
            .sessions
            .get(session_token)
            .filter(|s| s.expires > now)
            .map(|s| s.user_id.clone()))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(id).map(|u| u.value().clone()))
    }

    async fn upsert_user(&self, fields: &LocalUserFields) -> Result<String, StoreError> {
        let existing = self
            .users
            .iter()
            .find(|u| u.username.as_deref() == Some(fields.username.as_str()))
            .map(|u| u.id.clone());
        let id = existing.unwrap_or_else(|| Uuid::new_v4().to_string());

        self.users.insert(
            id.clone(),
            User {
                id: id.clone(),
                name: Some(fields.name.clone()),
                email: fields.email.clone(),
                image: fields.image.clone(),
                username: Some(fields.username.clone()),
            },
        );
        Ok(id)
    }

    async fn list_users(
        &self,
        name: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<User>, StoreError> {
        let needle = name.map(str::to_lowercase);
        let mut rows: Vec<User> = self
            .users
            .iter()
            .filter(|u| match (&needle, &u.name) {
                (None, _) => true,
                (Some(n), Some(name)) => name.to_lowercase().contains(n.as_str()),
                (Some(_), None) => false,
            })
            .map(|u| u.value().clone())
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));

        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }
}
