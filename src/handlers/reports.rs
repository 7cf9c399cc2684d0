//! Reporting HTTP handlers. Admins and team leads only.
//!
//! - GET /api/v1/reports/summary - Dashboard totals
//! - GET /api/v1/reports/by-category - Equipment count and value per category
//! - GET /api/v1/reports/by-team - Assigned equipment per team

use axum::{Extension, Json, extract::State};

use crate::{
    app::AppState,
    error::AppError,
    middleware::auth::AuthUser,
    models::report::{CategoryReport, SummaryReport, TeamReport},
    services::report_service,
};

/// Dashboard totals.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "equipment_total": 42,
///   "equipment_by_status": [{"status": "assigned", "count": 30}, ...],
///   "equipment_value_cents": 5230000,
///   "requests_by_status": [{"status": "pending", "count": 3}, ...],
///   "monthly_subscription_cents": 89900,
///   "maintenance_cost_cents": 41000
/// }
/// ```
pub async fn summary(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<SummaryReport>, AppError> {
    let report = report_service::summary(&state.pool, &auth).await?;
    Ok(Json(report))
}

pub async fn by_category(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<CategoryReport>>, AppError> {
    Ok(Json(report_service::by_category(&state.pool, &auth).await?))
}

pub async fn by_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<TeamReport>>, AppError> {
    Ok(Json(report_service::by_team(&state.pool, &auth).await?))
}
