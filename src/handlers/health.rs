//! Health check endpoint for service monitoring.

use crate::{app::AppState, error::AppError};
use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service status
    pub status: &'static str,

    /// Database connection status
    pub database: &'static str,

    /// Whether invoice OCR is configured
    pub ocr: bool,

    /// Whether notifications are delivered to a mail relay
    pub mail_relay: bool,

    /// Current server timestamp
    pub timestamp: DateTime<Utc>,
}

/// Health check handler.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "status": "healthy",
///   "database": "connected",
///   "ocr": true,
///   "mail_relay": false,
///   "timestamp": "2025-12-21T19:00:00Z"
/// }
/// ```
///
/// If the database is unreachable, returns the standard error response (500).
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    sqlx::query("SELECT 1").execute(&state.pool).await?;

    Ok(Json(HealthResponse {
        status: "healthy",
        database: "connected",
        ocr: state.config.gemini_api_key.is_some(),
        mail_relay: state.config.mail_relay_url.is_some(),
        timestamp: Utc::now(),
    }))
}
