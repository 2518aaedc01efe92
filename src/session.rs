//! Session cookie resolution.
//!
//! Sign-in itself happens in the external auth layer, which writes a row to
//! `sessions` and sets the session cookie. We only read it back.

use axum::http::HeaderMap;
use axum_extra::extract::CookieJar;
use chrono::Utc;
use std::sync::Arc;

use crate::store::{SessionStore, StoreError};

pub const SESSION_COOKIE: &str = "authjs.session-token";
pub const SECURE_SESSION_COOKIE: &str = "__Secure-authjs.session-token";

/// Non-empty value of the named cookie.
pub fn cookie_value(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|c| c.value().trim_matches('"'))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// The plain cookie wins over the `__Secure-` one when both are sent.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    cookie_value(&jar, SESSION_COOKIE).or_else(|| cookie_value(&jar, SECURE_SESSION_COOKIE))
}

#[derive(Clone)]
pub struct SessionResolver {
    store: Arc<dyn SessionStore>,
}

impl SessionResolver {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// User id behind the request's session cookie. `None` when there is no
    /// cookie or no live session for it.
    pub async fn resolve(&self, headers: &HeaderMap) -> Result<Option<String>, StoreError> {
        let Some(token) = session_token(headers) else {
            return Ok(None);
        };
        let user = self.store.find_session_user(&token, Utc::now()).await?;
        if user.is_none() {
            tracing::debug!("session cookie present but no live session");
        }
        Ok(user)
    }
}
