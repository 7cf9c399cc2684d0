//! Team models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maps to the `teams` table.
///
/// A team optionally has a lead, who approves the first stage of equipment
/// requests made by team members.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Team {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub organization_id: Uuid,
    pub name: String,
    pub team_lead_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub name: String,
}

/// Body of `PUT /api/v1/teams/{id}/lead`.
#[derive(Debug, Deserialize)]
pub struct SetTeamLeadRequest {
    pub user_id: Uuid,
}

/// Team listing row with its member count.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct TeamResponse {
    pub id: Uuid,
    pub name: String,
    pub team_lead_id: Option<Uuid>,
    pub member_count: i64,
    pub created_at: DateTime<Utc>,
}
