//! Session cookie authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the session token from the `session` cookie
//! 2. Hash it and look up a live session of an active user
//! 3. Inject the authenticated user into the request
//! 4. Reject unauthenticated requests with HTTP 401

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{
    app::AppState,
    error::AppError,
    models::user::Role,
    services::{auth_service, workflow::Actor},
};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session";

/// Authenticated user attached to protected requests.
///
/// Inserted into the request's extension map; handlers extract it with
/// `Extension<AuthUser>`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,

    /// Tenant every query of this request is scoped to
    pub organization_id: Uuid,

    pub team_id: Option<Uuid>,
    pub email: String,
    pub name: String,
    pub role: Role,

    /// Session used for this request, deleted on logout
    pub session_id: Uuid,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Fail with 403 unless the user holds at least `role`.
    pub fn require(&self, role: Role) -> Result<(), AppError> {
        if self.role >= role {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        self.require(Role::Admin)
    }

    pub fn actor(&self) -> Actor {
        Actor {
            id: self.id,
            role: self.role,
        }
    }
}

/// Row returned by the session lookup.
#[derive(Debug, sqlx::FromRow)]
struct SessionUser {
    session_id: Uuid,
    user_id: Uuid,
    organization_id: Uuid,
    team_id: Option<Uuid>,
    email: String,
    name: String,
    role: String,
}

/// Session authentication middleware function.
///
/// # Flow
///
/// 1. Read the `session` cookie from the `Cookie` header(s)
/// 2. Hash the token using SHA-256
/// 3. Find an unexpired session whose user is active
/// 4. If found: inject `AuthUser` into request, call next handler
/// 5. If not found: return 401 Unauthorized error
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = session_token(request.headers()).ok_or(AppError::Unauthenticated)?;
    let token_hash = auth_service::hash_token(token);

    let session = sqlx::query_as::<_, SessionUser>(
        r#"
        SELECT s.id AS session_id, u.id AS user_id, u.organization_id, u.team_id,
               u.email, u.name, u.role
        FROM sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.token_hash = $1 AND s.expires_at > NOW() AND u.is_active = true
        "#,
    )
    .bind(&token_hash)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::Unauthenticated)?;

    let user = AuthUser {
        id: session.user_id,
        organization_id: session.organization_id,
        team_id: session.team_id,
        email: session.email,
        name: session.name,
        role: Role::from_db(&session.role),
        session_id: session.session_id,
    };

    // Route handlers can now extract this using Extension<AuthUser>
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Find the session token among the request cookies.
///
/// Browsers may send several `Cookie` headers; each holds `name=value` pairs
/// separated by `;`.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim_matches('"'))
        .filter(|value| !value.is_empty())
}
