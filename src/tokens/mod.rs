//! API token issuance and verification.
//!
//! Mint flow:
//! 1. Require an authenticated principal
//! 2. Validate the requested expiry (parseable, strictly in the future)
//! 3. Draw 32 random bytes, hex-encode → raw token
//! 4. SHA-256 the raw token → stored id
//! 5. Insert `{id, user_id, expires_at}`; on id collision retry with fresh randomness
//! 6. Hand the raw token back once
//!
//! Verification re-hashes the presented token and looks the record up by id.

pub mod expiry;
pub mod secret;

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::errors::TokenError;
use crate::models::token::{short_digest, AuthToken, IssuedToken, NewAuthToken};
use crate::models::user::Principal;
use crate::store::TokenStore;
use secret::{digest_token, generate_raw_token, looks_like_token, OsSecretSource, SecretSource};

pub const DEFAULT_MINT_ATTEMPTS: u32 = 3;

/// Expiry as it arrives from a caller, before validation.
#[derive(Debug, Clone)]
pub enum RequestedExpiry {
    Text(String),
    EpochMillis(i64),
}

impl RequestedExpiry {
    fn resolve(&self) -> Result<DateTime<Utc>, TokenError> {
        match self {
            RequestedExpiry::Text(s) => expiry::parse_expiry(s),
            RequestedExpiry::EpochMillis(ms) => expiry::expiry_from_millis(*ms),
        }
    }
}

impl From<&str> for RequestedExpiry {
    fn from(s: &str) -> Self {
        RequestedExpiry::Text(s.to_string())
    }
}

#[derive(Clone)]
pub struct TokenService {
    store: Arc<dyn TokenStore>,
    secrets: Arc<dyn SecretSource>,
    max_attempts: u32,
}

impl TokenService {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self {
            store,
            secrets: Arc::new(OsSecretSource),
            max_attempts: DEFAULT_MINT_ATTEMPTS,
        }
    }

    pub fn with_secret_source(mut self, secrets: Arc<dyn SecretSource>) -> Self {
        self.secrets = secrets;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub async fn mint(
        &self,
        principal: Option<&Principal>,
        requested: impl Into<RequestedExpiry>,
    ) -> Result<IssuedToken, TokenError> {
        self.mint_at(principal, requested.into(), Utc::now()).await
    }

    pub async fn mint_at(
        &self,
        principal: Option<&Principal>,
        requested: RequestedExpiry,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let principal = principal.ok_or(TokenError::Unauthorized)?;

        let expires_at = requested.resolve()?;
        expiry::ensure_future(expires_at, now)?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let raw = generate_raw_token(self.secrets.as_ref());
            let record = NewAuthToken {
                id: digest_token(&raw),
                user_id: principal.user_id.clone(),
                expires_at,
            };

            match self.store.create(&record).await {
                Ok(row) => {
                    tracing::info!(
                        user_id = %row.user_id,
                        token = %row.short_id(),
                        expires_at = %row.expires_at,
                        "api token minted"
                    );
                    return Ok(IssuedToken {
                        raw,
                        id: row.id,
                        expires_at: row.expires_at,
                    });
                }
                Err(e) => match TokenError::from(e) {
                    TokenError::StorageConflict if attempt < self.max_attempts => {
                        tracing::warn!(
                            attempt,
                            token = %short_digest(&record.id),
                            "token id collision, regenerating"
                        );
                    }
                    other => return Err(other),
                },
            }
        }
    }

    pub async fn verify(&self, presented: &str) -> Result<String, TokenError> {
        self.verify_at(presented, Utc::now()).await
    }

    /// Resolve a presented raw token to its owner's id.
    pub async fn verify_at(&self, presented: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        let presented = presented.trim();
        if !looks_like_token(presented) {
            return Err(TokenError::InvalidToken);
        }

        let id = digest_token(presented);
        let record = self
            .store
            .find_by_key(&id)
            .await?
            .ok_or(TokenError::InvalidToken)?;

        if record.is_expired_at(now) {
            tracing::debug!(token = %record.short_id(), "expired api token presented");
            if let Err(e) = self.store.delete(&record.id).await {
                tracing::warn!(token = %record.short_id(), "failed to purge expired token: {}", e);
            }
            return Err(TokenError::TokenExpired);
        }

        Ok(record.user_id)
    }

    pub async fn list(&self, principal: &Principal) -> Result<Vec<AuthToken>, TokenError> {
        Ok(self
            .store
            .list_for_owner(&principal.user_id, Utc::now())
            .await?)
    }

    /// Delete one of the principal's tokens by stored id.
    pub async fn revoke(&self, principal: &Principal, id: &str) -> Result<(), TokenError> {
        if self.store.delete_owned(id, &principal.user_id).await? {
            tracing::info!(user_id = %principal.user_id, token = %short_digest(id), "api token revoked");
            Ok(())
        } else {
            Err(TokenError::InvalidToken)
        }
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, TokenError> {
        Ok(self.store.purge_expired(now).await?)
    }
}
