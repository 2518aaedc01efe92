use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::{AppError, TokenError};
use crate::models::token::TokenSummary;
use crate::models::user::{AuthMethod, Principal, User};
use crate::tokens::expiry::INVALID_EXPIRY;
use crate::tokens::RequestedExpiry;
use crate::AppState;

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Deserialize)]
pub struct MintTokenRequest {
    #[serde(rename = "expiresAt")]
    pub expires_at: Option<Value>,
}

#[derive(Serialize)]
pub struct MintTokenResponse {
    pub token: String,
}

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Query string of `GET /api/users`. Paging values are taken leniently:
/// anything unparseable or out of range falls back to the default.
#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub name: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl ListUsersQuery {
    pub fn name_filter(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }

    /// `(limit, offset)` for the requested page.
    pub fn window(&self) -> (i64, i64) {
        let page = self
            .page
            .as_deref()
            .and_then(|p| p.trim().parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1);
        let limit = self
            .limit
            .as_deref()
            .and_then(|l| l.trim().parse::<i64>().ok())
            .filter(|l| (1..=MAX_PAGE_SIZE).contains(l))
            .unwrap_or(DEFAULT_PAGE_SIZE);
        (limit, (page - 1).saturating_mul(limit))
    }
}

#[derive(Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    pub commit: &'static str,
    pub build_date: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            commit: option_env!("KURO_GIT_COMMIT").unwrap_or("none"),
            build_date: option_env!("KURO_BUILD_DATE").unwrap_or("unknown"),
        }
    }
}

fn requested_expiry(value: Option<Value>) -> Result<RequestedExpiry, TokenError> {
    match value {
        Some(Value::String(s)) => Ok(RequestedExpiry::Text(s)),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(RequestedExpiry::EpochMillis)
            .ok_or_else(|| TokenError::InvalidInput(INVALID_EXPIRY.into())),
        _ => Err(TokenError::InvalidInput(INVALID_EXPIRY.into())),
    }
}

/// Only a signed-in browser session may mint; an API token cannot mint more.
fn session_principal(principal: Option<Extension<Principal>>) -> Result<Principal, TokenError> {
    principal
        .map(|Extension(p)| p)
        .filter(|p| p.method == AuthMethod::Session)
        .ok_or(TokenError::Unauthorized)
}

fn any_principal(principal: Option<Extension<Principal>>) -> Result<Principal, TokenError> {
    principal.map(|Extension(p)| p).ok_or(TokenError::Unauthorized)
}

// ── Handlers ─────────────────────────────────────────────────

/// POST /api/auth/token — mint a token for the session's user.
/// The raw token appears in this response and nowhere else.
pub async fn mint_token(
    State(state): State<Arc<AppState>>,
    principal: Option<Extension<Principal>>,
    payload: Result<Json<MintTokenRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MintTokenResponse>), AppError> {
    let principal = session_principal(principal)?;

    let Json(body) = payload.map_err(|e| {
        tracing::debug!("mint_token: unreadable body: {}", e);
        TokenError::InvalidInput(INVALID_EXPIRY.into())
    })?;
    let requested = requested_expiry(body.expires_at)?;

    let issued = state.tokens.mint(Some(&principal), requested).await?;

    Ok((
        StatusCode::CREATED,
        Json(MintTokenResponse { token: issued.raw }),
    ))
}

/// GET /api/auth/tokens — the caller's live tokens (digests only).
pub async fn list_tokens(
    State(state): State<Arc<AppState>>,
    principal: Option<Extension<Principal>>,
) -> Result<Json<Vec<TokenSummary>>, AppError> {
    let principal = any_principal(principal)?;
    let tokens = state.tokens.list(&principal).await?;
    Ok(Json(tokens.into_iter().map(TokenSummary::from).collect()))
}

/// DELETE /api/auth/tokens/:id — revoke one of the caller's tokens.
pub async fn revoke_token(
    State(state): State<Arc<AppState>>,
    principal: Option<Extension<Principal>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let principal = session_principal(principal)?;
    match state.tokens.revoke(&principal, &id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(TokenError::InvalidToken) => Err(AppError::NotFound),
        Err(e) => Err(e.into()),
    }
}

/// GET /api/users/me — profile of the session or token owner.
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    principal: Option<Extension<Principal>>,
) -> Result<Json<User>, AppError> {
    let principal = any_principal(principal)?;
    let user = state
        .users
        .find_user(&principal.user_id)
        .await
        .map_err(TokenError::from)?
        .ok_or_else(|| {
            tracing::warn!(user_id = %principal.user_id, "authenticated user has no users row");
            AppError::NotFound
        })?;
    Ok(Json(user))
}

/// GET /api/users — user directory, optionally filtered by name.
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    principal: Option<Extension<Principal>>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Vec<User>>, AppError> {
    any_principal(principal)?;
    let (limit, offset) = query.window();
    let users = state
        .users
        .list_users(query.name_filter(), limit, offset)
        .await
        .map_err(TokenError::from)?;
    Ok(Json(users))
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "time": Utc::now().to_rfc3339(),
    }))
}

pub async fn version() -> Json<BuildInfo> {
    Json(BuildInfo::current())
}

pub async fn ping() -> Json<Value> {
    Json(json!({
        "message": "pong",
        "time": Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_expiry_accepts_string_and_number() {
        assert!(matches!(
            requested_expiry(Some(json!("2099-01-01"))),
            Ok(RequestedExpiry::Text(s)) if s == "2099-01-01"
        ));
        assert!(matches!(
            requested_expiry(Some(json!(4070908800000i64))),
            Ok(RequestedExpiry::EpochMillis(4070908800000))
        ));
    }

    #[test]
    fn test_requested_expiry_rejects_other_shapes() {
        for v in [None, Some(json!(null)), Some(json!(true)), Some(json!({})), Some(json!(1.5))] {
            assert!(matches!(
                requested_expiry(v),
                Err(TokenError::InvalidInput(_))
            ));
        }
    }

    fn users_query(page: Option<&str>, limit: Option<&str>) -> ListUsersQuery {
        ListUsersQuery {
            name: None,
            page: page.map(Into::into),
            limit: limit.map(Into::into),
        }
    }

    #[test]
    fn test_users_window_defaults_and_paging() {
        assert_eq!(users_query(None, None).window(), (10, 0));
        assert_eq!(users_query(Some("3"), Some("25")).window(), (25, 50));
        assert_eq!(users_query(Some("2"), Some("100")).window(), (100, 100));
    }

    #[test]
    fn test_users_window_out_of_range_falls_back() {
        assert_eq!(users_query(Some("0"), Some("0")).window(), (10, 0));
        assert_eq!(users_query(Some("-4"), Some("101")).window(), (10, 0));
        assert_eq!(users_query(Some("abc"), Some("ten")).window(), (10, 0));
    }

    #[test]
    fn test_users_name_filter_ignores_blank() {
        let mut q = ListUsersQuery::default();
        assert_eq!(q.name_filter(), None);
        q.name = Some("   ".into());
        assert_eq!(q.name_filter(), None);
        q.name = Some(" ada ".into());
        assert_eq!(q.name_filter(), Some("ada"));
    }

    #[test]
    fn test_token_principal_cannot_mint() {
        let p = Principal::from_token("u1");
        assert!(matches!(
            session_principal(Some(Extension(p))),
            Err(TokenError::Unauthorized)
        ));
        assert!(session_principal(Some(Extension(Principal::from_session("u1")))).is_ok());
        assert!(session_principal(None).is_err());
    }
}
