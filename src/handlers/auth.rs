//! Session HTTP handlers.
//!
//! - POST /api/v1/auth/login - Exchange credentials for a session cookie
//! - POST /api/v1/auth/logout - End the current session
//! - GET /api/v1/auth/me - Who am I

use axum::{
    Extension, Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    app::AppState,
    error::AppError,
    extract::AppJson,
    middleware::auth::AuthUser,
    models::user::{LoginRequest, Role, UserResponse},
    services::auth_service,
    validation::Validator,
};

/// Log in with email and password.
///
/// # Request Body
///
/// ```json
/// { "email": "ana@example.com", "password": "correct horse battery staple" }
/// ```
///
/// # Response
///
/// - **Success (200 OK)**: the user, plus a `Set-Cookie: session=...` header
/// - **Error (400)**: malformed email or empty password
/// - **Error (401)**: `invalid_credentials`
pub async fn login(
    State(state): State<AppState>,
    AppJson(request): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    // Reject obviously bad input before touching the database
    Validator::new()
        .email("email", &request.email)
        .required("password", &request.password, 1024)
        .finish()?;

    let (token, user) =
        auth_service::login(&state.pool, &state.config, &request.email, &request.password).await?;

    let cookie = auth_service::session_cookie(
        &token,
        state.config.session_ttl_hours,
        state.config.cookie_secure,
    );

    Ok(([(header::SET_COOKIE, cookie)], Json(UserResponse::from(user))))
}

/// Log out: delete the session and clear the cookie.
///
/// # Response (204 No Content)
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    auth_service::logout(&state.pool, auth.session_id).await?;

    Ok((
        StatusCode::NO_CONTENT,
        [(
            header::SET_COOKIE,
            auth_service::clear_session_cookie(state.config.cookie_secure),
        )],
    ))
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub team_id: Option<Uuid>,
    pub email: String,
    pub name: String,
    pub role: Role,
}

pub async fn me(Extension(auth): Extension<AuthUser>) -> Json<MeResponse> {
    Json(MeResponse {
        id: auth.id,
        organization_id: auth.organization_id,
        team_id: auth.team_id,
        email: auth.email,
        name: auth.name,
        role: auth.role,
    })
}
