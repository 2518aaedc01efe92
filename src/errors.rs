use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Outcomes of the mint / verify flow.
///
/// Everything except `Storage` is an expected control-flow result and is
/// never logged as a server error.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("token id collision")]
    StorageConflict,

    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    TokenExpired,

    #[error("storage error: {0}")]
    Storage(#[source] anyhow::Error),
}

impl From<StoreError> for TokenError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict => TokenError::StorageConflict,
            StoreError::Backend(e) => TokenError::Storage(e),
        }
    }
}

/// Errors surfaced by HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("not found")]
    NotFound,

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, msg) = match &self {
            AppError::Token(TokenError::Unauthorized) => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Unauthorized".to_string(),
            ),
            AppError::Token(TokenError::InvalidInput(reason)) => (
                StatusCode::BAD_REQUEST,
                "invalid_input",
                reason.clone(),
            ),
            AppError::Token(TokenError::StorageConflict) => {
                tracing::warn!("token mint exhausted retries on id collision");
                (
                    StatusCode::CONFLICT,
                    "storage_conflict",
                    "Token generation failed, please retry".to_string(),
                )
            }
            AppError::Token(TokenError::InvalidToken) => (
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                "Invalid token".to_string(),
            ),
            AppError::Token(TokenError::TokenExpired) => (
                StatusCode::UNAUTHORIZED,
                "token_expired",
                "Token expired".to_string(),
            ),
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                "not_found",
                "Not found".to_string(),
            ),
            AppError::Token(TokenError::Storage(e)) => {
                tracing::error!("Storage error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": msg,
            "code": code,
        }));

        let mut response = (status, body).into_response();

        // A fresh attempt draws new randomness, so the client may simply retry.
        if matches!(self, AppError::Token(TokenError::StorageConflict)) {
            response.headers_mut().insert(
                "retry-after",
                axum::http::HeaderValue::from_static("1"),
            );
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_unauthorized_body_matches_wire_contract() {
        let resp = AppError::from(TokenError::Unauthorized).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "Unauthorized");
        assert_eq!(body["code"], "unauthorized");
    }

    #[tokio::test]
    async fn test_invalid_input_carries_reason() {
        let resp = AppError::from(TokenError::InvalidInput(
            "Invalid expiration date".into(),
        ))
        .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "Invalid expiration date");
    }

    #[tokio::test]
    async fn test_expired_and_invalid_tokens_are_distinguished() {
        let resp = AppError::from(TokenError::TokenExpired).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "Token expired");
        assert_eq!(body["code"], "token_expired");

        let resp = AppError::from(TokenError::InvalidToken).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(resp).await["code"], "invalid_token");
    }

    #[test]
    fn test_storage_conflict_sets_retry_after() {
        let resp = AppError::from(TokenError::StorageConflict).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(resp.headers()["retry-after"], "1");
    }

    #[test]
    fn test_store_conflict_maps_to_storage_conflict() {
        let err: TokenError = StoreError::Conflict.into();
        assert!(matches!(err, TokenError::StorageConflict));
    }

    #[tokio::test]
    async fn test_backend_failure_hides_details() {
        let resp = AppError::from(TokenError::Storage(anyhow::anyhow!(
            "connection refused to 10.0.0.5"
        )))
        .into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "Internal server error");
    }
}
