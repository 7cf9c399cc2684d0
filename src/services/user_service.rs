//! User and team administration.
//!
//! All functions take the caller's `organization_id` and never touch rows of
//! another organization; such rows are reported as not found.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        team::{Team, TeamResponse},
        user::{CreateUserRequest, Role, UpdateUserRequest, User},
    },
    services::auth_service,
    validation::Validator,
};

const MIN_PASSWORD_LEN: usize = 8;

pub async fn create_user(
    pool: &DbPool,
    organization_id: Uuid,
    request: CreateUserRequest,
) -> Result<User, AppError> {
    Validator::new()
        .email("email", &request.email)
        .required("name", &request.name, 200)
        .min_len("password", &request.password, MIN_PASSWORD_LEN)
        .finish()?;

    if let Some(team_id) = request.team_id {
        get_team(pool, organization_id, team_id).await?;
    }

    let password_hash = auth_service::hash_password(&request.password)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (organization_id, team_id, email, name, role, password_hash)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(organization_id)
    .bind(request.team_id)
    .bind(request.email.trim().to_lowercase())
    .bind(request.name.trim())
    .bind(request.role.as_str())
    .bind(password_hash)
    .fetch_one(pool)
    .await?;

    tracing::info!(user_id = %user.id, role = user.role.as_str(), "User created");

    Ok(user)
}

pub async fn list_users(pool: &DbPool, organization_id: Uuid) -> Result<Vec<User>, AppError> {
    let users = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE organization_id = $1 ORDER BY name, email",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;

    Ok(users)
}

pub async fn get_user(pool: &DbPool, organization_id: Uuid, user_id: Uuid) -> Result<User, AppError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND organization_id = $2")
        .bind(user_id)
        .bind(organization_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("user"))
}

/// Apply a partial update to a user.
///
/// # Side effects
///
/// - Leaving a team or dropping to the `user` role removes team leadership
/// - Deactivation ends all of the user's sessions
pub async fn update_user(
    pool: &DbPool,
    organization_id: Uuid,
    user_id: Uuid,
    request: UpdateUserRequest,
) -> Result<User, AppError> {
    let mut validator = Validator::new();
    if let Some(ref name) = request.name {
        validator.required("name", name, 200);
    }
    if let Some(ref password) = request.password {
        validator.min_len("password", password, MIN_PASSWORD_LEN);
    }
    validator.finish()?;

    let existing = get_user(pool, organization_id, user_id).await?;
    if let Some(Some(team_id)) = request.team_id {
        get_team(pool, organization_id, team_id).await?;
    }

    let password_hash = request
        .password
        .as_deref()
        .map(auth_service::hash_password)
        .transpose()?;
    let team_changed = matches!(request.team_id, Some(team) if team != existing.team_id);

    let mut tx = pool.begin().await?;

    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET name = COALESCE($3, name),
            role = COALESCE($4, role),
            team_id = CASE WHEN $5 THEN $6 ELSE team_id END,
            is_active = COALESCE($7, is_active),
            password_hash = COALESCE($8, password_hash),
            updated_at = NOW()
        WHERE id = $1 AND organization_id = $2
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(organization_id)
    .bind(request.name.as_deref().map(str::trim))
    .bind(request.role.map(Role::as_str))
    .bind(request.team_id.is_some())
    .bind(request.team_id.flatten())
    .bind(request.is_active)
    .bind(password_hash)
    .fetch_one(&mut *tx)
    .await?;

    // A lead who left the team, lost the role or was deactivated no longer leads it
    if team_changed || user.role() == Role::User || !user.is_active {
        sqlx::query("UPDATE teams SET team_lead_id = NULL WHERE team_lead_id = $1")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;
    }

    if !user.is_active {
        sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(user)
}

pub async fn create_team(pool: &DbPool, organization_id: Uuid, name: &str) -> Result<Team, AppError> {
    Validator::new().required("name", name, 200).finish()?;

    let team = sqlx::query_as::<_, Team>(
        "INSERT INTO teams (organization_id, name) VALUES ($1, $2) RETURNING *",
    )
    .bind(organization_id)
    .bind(name.trim())
    .fetch_one(pool)
    .await?;

    Ok(team)
}

pub async fn list_teams(pool: &DbPool, organization_id: Uuid) -> Result<Vec<TeamResponse>, AppError> {
    let teams = sqlx::query_as::<_, TeamResponse>(
        r#"
        SELECT t.id, t.name, t.team_lead_id, COUNT(u.id) AS member_count, t.created_at
        FROM teams t
        LEFT JOIN users u ON u.team_id = t.id
        WHERE t.organization_id = $1
        GROUP BY t.id
        ORDER BY t.name
        "#,
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;

    Ok(teams)
}

pub async fn get_team(pool: &DbPool, organization_id: Uuid, team_id: Uuid) -> Result<Team, AppError> {
    sqlx::query_as::<_, Team>("SELECT * FROM teams WHERE id = $1 AND organization_id = $2")
        .bind(team_id)
        .bind(organization_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("team"))
}

/// Make a team member the team's lead.
///
/// Plain users are promoted to `team_lead`; admins keep their role. A lead
/// being replaced goes back to `user`.
pub async fn set_team_lead(
    pool: &DbPool,
    organization_id: Uuid,
    team_id: Uuid,
    user_id: Uuid,
) -> Result<Team, AppError> {
    get_team(pool, organization_id, team_id).await?;
    let user = get_user(pool, organization_id, user_id).await?;

    if user.team_id != Some(team_id) {
        return Err(AppError::InvalidRequest(
            "Team lead must be a member of the team".to_string(),
        ));
    }
    if !user.is_active {
        return Err(AppError::InvalidRequest(
            "Team lead must be an active user".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let former_lead = lock_team_lead(&mut tx, team_id).await?;

    let team = sqlx::query_as::<_, Team>(
        "UPDATE teams SET team_lead_id = $2 WHERE id = $1 RETURNING *",
    )
    .bind(team_id)
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;

    if let Some(former) = former_lead.filter(|former| *former != user_id) {
        demote_former_lead(&mut tx, former).await?;
    }

    sqlx::query(
        "UPDATE users SET role = 'team_lead', updated_at = NOW() WHERE id = $1 AND role = 'user'",
    )
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(team_id = %team_id, user_id = %user_id, "Team lead set");

    Ok(team)
}

/// Remove a team's lead. The former lead goes back to the `user` role.
pub async fn clear_team_lead(
    pool: &DbPool,
    organization_id: Uuid,
    team_id: Uuid,
) -> Result<Team, AppError> {
    get_team(pool, organization_id, team_id).await?;

    let mut tx = pool.begin().await?;

    let former_lead = lock_team_lead(&mut tx, team_id).await?;

    let team = sqlx::query_as::<_, Team>(
        "UPDATE teams SET team_lead_id = NULL WHERE id = $1 RETURNING *",
    )
    .bind(team_id)
    .fetch_one(&mut *tx)
    .await?;

    if let Some(former) = former_lead {
        demote_former_lead(&mut tx, former).await?;
    }

    tx.commit().await?;

    tracing::info!(team_id = %team_id, former_lead = ?former_lead, "Team lead cleared");

    Ok(team)
}

/// Current lead of a team, locking the team row.
async fn lock_team_lead(conn: &mut PgConnection, team_id: Uuid) -> Result<Option<Uuid>, AppError> {
    let lead: Option<Uuid> =
        sqlx::query_scalar("SELECT team_lead_id FROM teams WHERE id = $1 FOR UPDATE")
            .bind(team_id)
            .fetch_one(conn)
            .await?;
    Ok(lead)
}

/// `team_lead` → `user`, unless they still lead some team. Admins keep their role.
async fn demote_former_lead(conn: &mut PgConnection, user_id: Uuid) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE users SET role = 'user', updated_at = NOW()
        WHERE id = $1
          AND role = 'team_lead'
          AND NOT EXISTS (SELECT 1 FROM teams WHERE team_lead_id = $1)
        "#,
    )
    .bind(user_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Active lead of a team, if the team exists and has one.
///
/// A deactivated lead routes like a team without a lead.
pub async fn team_lead_of(pool: &DbPool, team_id: Option<Uuid>) -> Result<Option<Uuid>, AppError> {
    let Some(team_id) = team_id else {
        return Ok(None);
    };

    let lead: Option<Uuid> = sqlx::query_scalar(
        r#"
        SELECT t.team_lead_id
        FROM teams t
        JOIN users u ON u.id = t.team_lead_id
        WHERE t.id = $1 AND u.is_active = true
        "#,
    )
    .bind(team_id)
    .fetch_optional(pool)
    .await?;

    Ok(lead)
}

/// Active users with the given role, for notifications.
pub async fn users_with_role(
    pool: &DbPool,
    organization_id: Uuid,
    role: Role,
) -> Result<Vec<User>, AppError> {
    let users = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE organization_id = $1 AND role = $2 AND is_active = true",
    )
    .bind(organization_id)
    .bind(role.as_str())
    .fetch_all(pool)
    .await?;

    Ok(users)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_support::{seed_organization, seed_team, seed_user};
    use sqlx::PgPool;

    async fn role_of(pool: &PgPool, organization_id: Uuid, user_id: Uuid) -> Role {
        get_user(pool, organization_id, user_id).await.unwrap().role()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn clearing_a_lead_demotes_them(pool: PgPool) {
        let org = seed_organization(&pool).await;
        let team = seed_team(&pool, org, "Platform").await;
        let lead = seed_user(&pool, org, Some(team), Role::User).await;

        set_team_lead(&pool, org, team, lead.id).await.unwrap();
        assert_eq!(role_of(&pool, org, lead.id).await, Role::TeamLead);

        let cleared = clear_team_lead(&pool, org, team).await.unwrap();

        assert_eq!(cleared.team_lead_id, None);
        assert_eq!(role_of(&pool, org, lead.id).await, Role::User);
        assert_eq!(team_lead_of(&pool, Some(team)).await.unwrap(), None);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn replacing_a_lead_demotes_the_former_one_but_never_an_admin(pool: PgPool) {
        let org = seed_organization(&pool).await;
        let team = seed_team(&pool, org, "Platform").await;
        let first = seed_user(&pool, org, Some(team), Role::User).await;
        let admin = seed_user(&pool, org, Some(team), Role::Admin).await;

        set_team_lead(&pool, org, team, first.id).await.unwrap();
        let team_row = set_team_lead(&pool, org, team, admin.id).await.unwrap();

        assert_eq!(team_row.team_lead_id, Some(admin.id));
        assert_eq!(role_of(&pool, org, first.id).await, Role::User);

        clear_team_lead(&pool, org, team).await.unwrap();
        assert_eq!(role_of(&pool, org, admin.id).await, Role::Admin);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn inactive_leads_are_not_reported_as_leads(pool: PgPool) {
        let org = seed_organization(&pool).await;
        let team = seed_team(&pool, org, "Platform").await;
        let lead = seed_user(&pool, org, Some(team), Role::TeamLead).await;
        set_team_lead(&pool, org, team, lead.id).await.unwrap();
        assert_eq!(team_lead_of(&pool, Some(team)).await.unwrap(), Some(lead.id));

        // Deactivated behind the service's back: the team row still names them
        sqlx::query("UPDATE users SET is_active = false WHERE id = $1")
            .bind(lead.id)
            .execute(&pool)
            .await
            .unwrap();

        assert_eq!(team_lead_of(&pool, Some(team)).await.unwrap(), None);
        assert_eq!(team_lead_of(&pool, None).await.unwrap(), None);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn deactivating_a_lead_frees_the_team_and_ends_their_sessions(pool: PgPool) {
        let org = seed_organization(&pool).await;
        let team = seed_team(&pool, org, "Platform").await;
        let lead = seed_user(&pool, org, Some(team), Role::TeamLead).await;
        set_team_lead(&pool, org, team, lead.id).await.unwrap();
        sqlx::query(
            "INSERT INTO sessions (user_id, token_hash, expires_at) VALUES ($1, 'h', NOW() + INTERVAL '1 hour')",
        )
        .bind(lead.id)
        .execute(&pool)
        .await
        .unwrap();

        let updated = update_user(
            &pool,
            org,
            lead.id,
            UpdateUserRequest {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(!updated.is_active);
        assert_eq!(get_team(&pool, org, team).await.unwrap().team_lead_id, None);
        let sessions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE user_id = $1")
            .bind(lead.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(sessions, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn created_users_get_argon2_hashes(pool: PgPool) {
        let org = seed_organization(&pool).await;

        let user = create_user(
            &pool,
            org,
            CreateUserRequest {
                email: "Ana@Example.com".to_string(),
                name: "Ana".to_string(),
                password: "correct horse battery".to_string(),
                role: Role::User,
                team_id: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(user.email, "ana@example.com");
        assert!(user.password_hash.starts_with("$argon2id$"));
        assert!(auth_service::verify_password("correct horse battery", &user.password_hash));
    }
}
