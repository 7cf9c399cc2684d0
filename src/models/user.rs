//! User data models and API request/response types.
//!
//! This module defines:
//! - `Role`: the three-level authorization hierarchy
//! - `User`: Database entity representing a person in an organization
//! - Request bodies for login and user administration
//! - `UserResponse`: Response body returned to clients (no password hash)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Authorization tier of a user.
///
/// Variants are ordered so `role >= Role::TeamLead` reads as "team lead or above".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    TeamLead,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::TeamLead => "team_lead",
            Role::Admin => "admin",
        }
    }

    /// Map a stored role string back to a `Role`.
    ///
    /// The column has a CHECK constraint; anything unexpected falls back to the
    /// least privileged tier.
    pub fn from_db(value: &str) -> Self {
        match value {
            "admin" => Role::Admin,
            "team_lead" => Role::TeamLead,
            _ => Role::User,
        }
    }
}

/// Represents a user record from the database.
///
/// # Database Table
///
/// Maps to the `users` table. Each user:
/// - Belongs to exactly one organization (tenant)
/// - Optionally belongs to one team
/// - Stores a salted password hash, never the password
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub team_id: Option<Uuid>,
    pub email: String,
    pub name: String,
    pub role: String,
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> Role {
        Role::from_db(&self.role)
    }
}

/// Login request body.
///
/// ```json
/// { "email": "ana@example.com", "password": "correct horse battery staple" }
/// ```
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for creating a user (admin only).
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    pub password: String,

    /// Defaults to `user`
    #[serde(default)]
    pub role: Role,

    pub team_id: Option<Uuid>,
}

/// Partial update of a user (admin only).
///
/// `team_id` distinguishes "absent" (leave unchanged) from `null` (remove
/// from team).
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub role: Option<Role>,

    #[serde(default, deserialize_with = "present")]
    pub team_id: Option<Option<Uuid>>,

    pub is_active: Option<bool>,
    pub password: Option<String>,
}

/// Deserialize a field that was present in the JSON, keeping an explicit `null`.
pub(crate) fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Response body for user endpoints.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub team_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Convert database User to API UserResponse.
///
/// This transformation removes the password hash and organization id.
impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            role: user.role(),
            email: user.email,
            name: user.name,
            team_id: user.team_id,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}
