//! Subscription HTTP handlers.

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    app::AppState,
    error::AppError,
    extract::{AppJson, AppPath},
    middleware::auth::AuthUser,
    models::subscription::{CreateSubscriptionRequest, Subscription},
    services::subscription_service,
};

pub async fn list_subscriptions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<Subscription>>, AppError> {
    let subscriptions = subscription_service::list_subscriptions(&state.pool, &auth).await?;
    Ok(Json(subscriptions))
}

/// Record a recurring cost.
///
/// # Request Body
///
/// ```json
/// {
///   "name": "Figma Professional",
///   "vendor": "Figma",
///   "cost_cents": 144000,
///   "billing_cycle": "yearly",
///   "renewal_date": "2026-01-31"
/// }
/// ```
pub async fn create_subscription(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppJson(request): AppJson<CreateSubscriptionRequest>,
) -> Result<(StatusCode, Json<Subscription>), AppError> {
    let subscription =
        subscription_service::create_subscription(&state.pool, &auth, request).await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

pub async fn delete_subscription(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppPath(subscription_id): AppPath<Uuid>,
) -> Result<StatusCode, AppError> {
    subscription_service::delete_subscription(&state.pool, &auth, subscription_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
