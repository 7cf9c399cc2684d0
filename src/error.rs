//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

/// A single failed field check, reported inside a validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Application-wide error type.
///
/// This enum represents all possible errors that can occur in the application.
/// Each variant maps to a specific HTTP status code and error message.
///
/// # Error Categories
///
/// - **Database / Storage / Internal**: infrastructure failures, hidden from clients
/// - **Authentication Errors**: missing session or wrong credentials
/// - **Authorization Errors**: authenticated but not allowed
/// - **Resource Errors**: requested resources not found in the caller's organization
/// - **Business Logic Errors**: state conflicts such as assigning assigned equipment
/// - **Validation Errors**: invalid request data
/// - **Upstream Errors**: the OCR model or another remote service misbehaved
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    ///
    /// Returns HTTP 500, except unique violations which become 409.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Reading or writing an uploaded file failed.
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    /// No valid session cookie on the request.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Authentication required")]
    Unauthenticated,

    /// Login attempt with an unknown email or wrong password.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// The caller's role does not allow the operation.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("You do not have permission to perform this action")]
    Forbidden,

    /// Resource does not exist or belongs to another organization.
    ///
    /// Returns HTTP 404 Not Found. The string names the resource kind
    /// (e.g. "equipment") and becomes part of the error code.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Operation conflicts with the current state of a resource.
    ///
    /// Returns HTTP 409 Conflict.
    #[error("{0}")]
    Conflict(String),

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    /// The String contains details about what was invalid.
    #[error("Invalid request")]
    InvalidRequest(String),

    /// One or more fields failed validation.
    ///
    /// Returns HTTP 400 Bad Request with the field list in `details`.
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Payload too large")]
    PayloadTooLarge,

    /// A remote service returned an unusable answer.
    ///
    /// Returns HTTP 502 Bad Gateway.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// A feature needs configuration that is missing.
    #[error("{0}")]
    ServiceUnavailable(String),
}

/// Postgres SQLSTATE for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// Validation errors add a `details` array of `{field, message}` objects.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut details = None;

        // Map each error variant to (HTTP status, error code, message)
        let (status, code, message) = match self {
            AppError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "unauthenticated".to_string(),
                self.to_string(),
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials".to_string(),
                self.to_string(),
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "forbidden".to_string(),
                self.to_string(),
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                format!("{}_not_found", resource.replace(' ', "_")),
                self.to_string(),
            ),
            AppError::Conflict(ref msg) => (StatusCode::CONFLICT, "conflict".to_string(), msg.clone()),
            AppError::InvalidRequest(ref msg) => (
                StatusCode::BAD_REQUEST,
                "invalid_request".to_string(),
                msg.clone(),
            ),
            AppError::Validation(ref errors) => {
                details = Some(errors.clone());
                (
                    StatusCode::BAD_REQUEST,
                    "validation_failed".to_string(),
                    self.to_string(),
                )
            }
            AppError::UnsupportedMediaType(_) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported_media_type".to_string(),
                self.to_string(),
            ),
            AppError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large".to_string(),
                self.to_string(),
            ),
            AppError::Upstream(ref msg) => {
                tracing::error!("Upstream failure: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "upstream_error".to_string(),
                    self.to_string(),
                )
            }
            AppError::ServiceUnavailable(ref msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable".to_string(),
                msg.clone(),
            ),
            AppError::Database(ref e) if is_unique_violation(e) => (
                StatusCode::CONFLICT,
                "conflict".to_string(),
                "A record with the same unique value already exists".to_string(),
            ),
            AppError::Database(_) | AppError::Storage(_) | AppError::Internal(_) => {
                tracing::error!("Internal error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error".to_string(),
                    "An internal error occurred".to_string(),
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let Some(details) = details {
            error["details"] = json!(details);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Malformed bodies answer 400 like any other invalid input; only a wrong
/// content type or an oversized body keep their own status.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection.status() {
            StatusCode::UNSUPPORTED_MEDIA_TYPE => {
                AppError::UnsupportedMediaType(rejection.body_text())
            }
            StatusCode::PAYLOAD_TOO_LARGE => AppError::PayloadTooLarge,
            _ => AppError::InvalidRequest(rejection.body_text()),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        // A route/handler mismatch, not the client's fault.
        if rejection.status().is_server_error() {
            return AppError::Internal(rejection.body_text());
        }
        AppError::InvalidRequest(rejection.body_text())
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    async fn render(error: AppError) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn not_found_code_names_the_resource() {
        let (status, body) = render(AppError::NotFound("equipment request")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "equipment_request_not_found");
        assert_eq!(body["error"]["message"], "equipment request not found");
    }

    #[tokio::test]
    async fn validation_errors_carry_field_details() {
        let (status, body) = render(AppError::Validation(vec![FieldError {
            field: "reason".to_string(),
            message: "must not be empty".to_string(),
        }]))
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "validation_failed");
        assert_eq!(body["error"]["details"][0]["field"], "reason");
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let (status, body) = render(AppError::Internal("disk on fire".to_string())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], "An internal error occurred");
        assert!(body["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn status_codes_follow_variants() {
        let cases = [
            (AppError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (AppError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AppError::Forbidden, StatusCode::FORBIDDEN),
            (AppError::Conflict("taken".into()), StatusCode::CONFLICT),
            (AppError::InvalidRequest("bad".into()), StatusCode::BAD_REQUEST),
            (AppError::PayloadTooLarge, StatusCode::PAYLOAD_TOO_LARGE),
            (AppError::Upstream("model".into()), StatusCode::BAD_GATEWAY),
            (
                AppError::ServiceUnavailable("ocr off".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                AppError::Database(sqlx::Error::RowNotFound),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            let (status, _) = render(error).await;
            assert_eq!(status, expected);
        }
    }
}
