use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Router,
};

use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::errors::{AppError, TokenError};
use crate::models::user::Principal;
use crate::AppState;

pub mod handlers;

/// Full HTTP surface: probes at the root, the API under `/api`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/ping", get(handlers::ping))
        .nest("/api", api_router(state.clone()))
        .fallback(fallback_404)
        .with_state(state)
}

/// Routes relative to `/api`.
pub fn api_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/token", post(handlers::mint_token))
        .route("/auth/tokens", get(handlers::list_tokens))
        .route("/auth/tokens/:id", delete(handlers::revoke_token))
        .route("/users/me", get(handlers::get_me))
        .route("/users", get(handlers::list_users))
        .layer(middleware::from_fn_with_state(state, authenticate))
        // probes stay reachable with a stale Authorization header
        .route("/health", get(handlers::health))
        .route("/version", get(handlers::version))
}

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Tags each request with an `x-request-id` (kept if the client sent one),
/// records it on the request span and echoes it on the response.
pub fn with_request_tracing(router: Router) -> Router {
    router
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
            let request_id = req
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "request",
                method = %req.method(),
                uri = %req.uri(),
                request_id = %request_id,
            )
        }))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Middleware: attaches a `Principal` when the caller is authenticated.
///
/// A bearer token is checked first; a present but bad token is rejected
/// outright rather than falling back to the session cookie. Requests with
/// neither pass through without a principal and the handler decides.
async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let principal = resolve_principal(&state, req.headers()).await?;
    if let Some(principal) = principal {
        req.extensions_mut().insert(principal);
    }
    Ok(next.run(req).await)
}

async fn resolve_principal(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<Principal>, AppError> {
    if let Some(token) = bearer_token(headers) {
        return match state.tokens.verify(token).await {
            Ok(user_id) => Ok(Some(Principal::from_token(user_id))),
            Err(e) => {
                tracing::debug!("bearer token rejected: {}", e);
                Err(e.into())
            }
        };
    }

    let user_id = state
        .sessions
        .resolve(headers)
        .await
        .map_err(TokenError::from)?;
    Ok(user_id.map(Principal::from_session))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_extraction() {
        let mut h = HeaderMap::new();
        assert_eq!(bearer_token(&h), None);

        h.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer  abc "));
        assert_eq!(bearer_token(&h), Some("abc"));

        h.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwdw=="));
        assert_eq!(bearer_token(&h), None);

        h.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&h), None);
    }
}
