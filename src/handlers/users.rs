//! User administration HTTP handlers. Admin only.
//!
//! - GET /api/v1/users - List users of the organization
//! - POST /api/v1/users - Create a user
//! - GET /api/v1/users/{id} - Get a user
//! - PATCH /api/v1/users/{id} - Update name, role, team, active flag or password

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
    models::user::{CreateUserRequest, UpdateUserRequest, UserResponse},
    services::user_service,
};

pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    auth.require_admin()?;

    let users = user_service::list_users(&state.pool, auth.organization_id).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Create a user.
///
/// # Request Body
///
/// ```json
/// {
///   "email": "ana@example.com",
///   "name": "Ana",
///   "password": "at-least-8-chars",
///   "role": "user",
///   "team_id": "550e8400-..."
/// }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: the user (never includes the password hash)
/// - **Error (400)**: validation failures
/// - **Error (409)**: email already taken
pub async fn create_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppJson(request): AppJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    auth.require_admin()?;

    let user = user_service::create_user(&state.pool, auth.organization_id, request).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn get_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppPath(user_id): AppPath<Uuid>,
) -> Result<Json<UserResponse>, AppError> {
    auth.require_admin()?;

    let user = user_service::get_user(&state.pool, auth.organization_id, user_id).await?;
    Ok(Json(user.into()))
}

/// Partially update a user.
///
/// Absent fields are left alone; `"team_id": null` removes the user from their
/// team. Deactivating a user ends their sessions.
pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppPath(user_id): AppPath<Uuid>,
    AppJson(request): AppJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    auth.require_admin()?;

    let demotes_self = request.is_active == Some(false)
        || request.role.is_some_and(|role| role != auth.role);
    if user_id == auth.id && demotes_self {
        return Err(AppError::InvalidRequest(
            "Admins cannot deactivate or demote themselves".to_string(),
        ));
    }

    let user =
        user_service::update_user(&state.pool, auth.organization_id, user_id, request).await?;
    Ok(Json(user.into()))
}
