//! API error taxonomy and its JSON rendering.
//!
//! Every failure surfaces as `{ "error": { "code", "message" } }`.
//! Internal details are logged, never echoed to the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::db::DatabaseError;
use crate::resolve::ResolveError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Authentication required")]
    Unauthorized,
    #[error("CSRF token missing or invalid")]
    CsrfMismatch,
    #[error("{0} not found")]
    NotFound(String),
    // Display hides the detail; it only reaches the log.
    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "AUTH_REQUIRED"),
            ApiError::CsrfMismatch => (StatusCode::FORBIDDEN, "CSRF_MISMATCH"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            error!(detail = %detail, "internal error");
        }
        let (status, code) = self.status_and_code();
        let body = Json(json!({ "error": { "code": code, "message": self.to_string() } }));
        (status, body).into_response()
    }
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound { entity_type, id } => {
                ApiError::NotFound(format!("{entity_type} {id}"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::Invalid => {
                ApiError::BadRequest("Invalid or missing patient identifier".to_string())
            }
            ResolveError::NotFound(code) => ApiError::NotFound(format!("Patient {code}")),
            ResolveError::Db(detail) => ApiError::Internal(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn not_found_renders_404() {
        let (status, body) = body_json(ApiError::NotFound("Patient 9".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert_eq!(body["error"]["message"], "Patient 9 not found");
    }

    #[tokio::test]
    async fn internal_hides_detail() {
        let (status, body) = body_json(ApiError::Internal("sqlite exploded".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], "Internal server error");
    }

    #[tokio::test]
    async fn resolver_errors_map_to_status() {
        let (status, _) = body_json(ResolveError::Invalid.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = body_json(ResolveError::NotFound("P-404".into()).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
