use serde::{Deserialize, Serialize};

/// How the caller proved who they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Session,
    ApiToken,
}

/// The authenticated identity attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub method: AuthMethod,
}

impl Principal {
    pub fn from_session(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            method: AuthMethod::Session,
        }
    }

    pub fn from_token(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            method: AuthMethod::ApiToken,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
    pub username: Option<String>,
}
