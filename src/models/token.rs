use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted API token. `id` is the hex SHA-256 of the raw token; the raw
/// token itself is never stored.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize, Deserialize)]
pub struct AuthToken {
    pub id: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl AuthToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Short digest prefix, safe for logs.
    pub fn short_id(&self) -> &str {
        short_digest(&self.id)
    }
}

/// Record handed to the store on mint.
#[derive(Debug, Clone)]
pub struct NewAuthToken {
    pub id: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of a successful mint. Holds the only copy of the raw token.
#[derive(Debug)]
pub struct IssuedToken {
    pub raw: String,
    pub id: String,
    pub expires_at: DateTime<Utc>,
}

/// Listing view of a token for its owner.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSummary {
    pub id: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<AuthToken> for TokenSummary {
    fn from(t: AuthToken) -> Self {
        Self {
            id: t.id,
            expires_at: t.expires_at,
            created_at: t.created_at,
        }
    }
}

pub fn short_digest(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
