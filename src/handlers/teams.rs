//! Team HTTP handlers.
//!
//! - GET /api/v1/teams - List teams with member counts
//! - POST /api/v1/teams - Create a team (admin)
//! - PUT /api/v1/teams/{id}/lead - Set the team lead (admin)
//! - DELETE /api/v1/teams/{id}/lead - Remove the team lead (admin)

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
    models::team::{CreateTeamRequest, SetTeamLeadRequest, Team, TeamResponse},
    services::user_service,
};

pub async fn list_teams(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<TeamResponse>>, AppError> {
    let teams = user_service::list_teams(&state.pool, auth.organization_id).await?;
    Ok(Json(teams))
}

pub async fn create_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppJson(request): AppJson<CreateTeamRequest>,
) -> Result<(StatusCode, Json<Team>), AppError> {
    auth.require_admin()?;

    let team = user_service::create_team(&state.pool, auth.organization_id, &request.name).await?;
    Ok((StatusCode::CREATED, Json(team)))
}

/// Make a member the lead of their team.
///
/// # Request Body
///
/// ```json
/// { "user_id": "550e8400-..." }
/// ```
///
/// # Response
///
/// - **Success (200 OK)**: the updated team
/// - **Error (400)**: user is not an active member of the team
/// - **Error (404)**: team or user not found
pub async fn set_team_lead(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppPath(team_id): AppPath<Uuid>,
    AppJson(request): AppJson<SetTeamLeadRequest>,
) -> Result<Json<Team>, AppError> {
    auth.require_admin()?;

    let team =
        user_service::set_team_lead(&state.pool, auth.organization_id, team_id, request.user_id)
            .await?;
    Ok(Json(team))
}

pub async fn clear_team_lead(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppPath(team_id): AppPath<Uuid>,
) -> Result<Json<Team>, AppError> {
    auth.require_admin()?;

    let team = user_service::clear_team_lead(&state.pool, auth.organization_id, team_id).await?;
    Ok(Json(team))
}
