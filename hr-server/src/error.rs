//! Error types for hr-server
//!
//! Every handler returns [`ApiResult`]. Errors render as `{"detail": ...}`
//! with the matching status code. Internal failures are logged here and
//! reach the client only as a generic message.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use hr_common::api::types::ExpiredTokenDetail;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing or invalid credentials (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Access token past its expiry (401 with structured detail)
    #[error("Token has expired")]
    TokenExpired(ExpiredTokenDetail),

    /// Authenticated but not allowed (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Conflict with existing state (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Request body over the configured limit (413)
    #[error("Payload too large")]
    PayloadTooLarge,

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// hr-common error
    #[error("Common error: {0}")]
    Common(#[from] hr_common::Error),
}

impl From<hr_common::ValidationError> for ApiError {
    fn from(err: hr_common::ValidationError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!(msg)),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, json!(msg)),
            ApiError::TokenExpired(detail) => (StatusCode::UNAUTHORIZED, json!(detail)),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, json!(msg)),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!(msg)),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, json!(msg)),
            ApiError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                json!("Request body too large"),
            ),
            ApiError::Common(hr_common::Error::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, json!(msg))
            }
            ApiError::Common(hr_common::Error::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, json!(msg))
            }
            ApiError::Internal(ref msg) => {
                error!("Internal error: {}", msg);
                internal()
            }
            ApiError::Database(ref err) => {
                error!("Database error: {}", err);
                internal()
            }
            ApiError::Common(ref err) => {
                error!("Common error: {}", err);
                internal()
            }
        };

        let mut response = (status, Json(json!({ "detail": detail }))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, header::HeaderValue::from_static("Bearer"));
        }
        response
    }
}

fn internal() -> (StatusCode, serde_json::Value) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        json!("Internal server error"),
    )
}

/// True when a database error is a UNIQUE constraint violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_envelope() {
        let response = ApiError::NotFound("Organization not found".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({"detail": "Organization not found"})
        );
    }

    #[tokio::test]
    async fn test_internal_error_hides_message() {
        let response = ApiError::Internal("SELECT * FROM secrets failed".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["detail"], "Internal server error");
    }

    #[tokio::test]
    async fn test_expired_token_detail_is_object() {
        let detail = ExpiredTokenDetail {
            message: "Token has expired".into(),
            token_iat: Some("2026-01-01T00:00:00+00:00".into()),
            token_exp: Some("2026-01-01T00:15:00+00:00".into()),
            server_time: "2026-01-01T00:20:00+00:00".into(),
        };
        let response = ApiError::TokenExpired(detail).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
        let body = body_json(response).await;
        assert_eq!(body["detail"]["message"], "Token has expired");
    }

    #[tokio::test]
    async fn test_validation_maps_to_bad_request() {
        let err: ApiError = hr_common::validation::rating(9).unwrap_err().into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
