//! Database connection pool, migration management and first-run bootstrap.
//!
//! This module provides utilities for:
//! - Creating and managing a PostgreSQL connection pool
//! - Running database migrations automatically
//! - Creating the first organization and admin account

use sqlx::{Pool, Postgres};

use crate::{config::Config, error::AppError, services::auth_service};

/// Type alias for PostgreSQL connection pool.
pub type DbPool = Pool<Postgres>;

/// Create a new PostgreSQL connection pool.
///
/// A connection pool maintains multiple database connections that can be reused across HTTP requests.
///
/// # Errors
///
/// Returns an error if:
/// - Database connection string is invalid
/// - Cannot connect to PostgreSQL server
/// - Database authentication fails
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Run database migrations from the `migrations/` directory.
///
/// Migrations are tracked in the `_sqlx_migrations` table, so each migration runs only once.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    // The macro reads migrations at compile time from ./migrations directory
    sqlx::migrate!("./migrations").run(pool).await
}

/// Create the bootstrap organization and its first admin.
///
/// Runs only when both `BOOTSTRAP_ADMIN_EMAIL` and `BOOTSTRAP_ADMIN_PASSWORD`
/// are set and the organization has no users yet, so restarts are harmless.
pub async fn bootstrap_admin(pool: &DbPool, config: &Config) -> Result<(), AppError> {
    let (Some(email), Some(plain)) = (
        config.bootstrap_admin_email.as_deref(),
        config.bootstrap_admin_password.as_deref(),
    ) else {
        return Ok(());
    };

    let password_hash = auth_service::hash_password(plain)?;

    let mut tx = pool.begin().await?;

    let organization_id: uuid::Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO organizations (name)
        VALUES ($1)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(&config.bootstrap_organization)
    .fetch_one(&mut *tx)
    .await?;

    let has_users: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE organization_id = $1)")
            .bind(organization_id)
            .fetch_one(&mut *tx)
            .await?;

    if has_users {
        tx.rollback().await?;
        return Ok(());
    }

    sqlx::query(
        r#"
        INSERT INTO users (organization_id, email, name, role, password_hash)
        VALUES ($1, $2, 'Administrator', 'admin', $3)
        "#,
    )
    .bind(organization_id)
    .bind(email.trim().to_lowercase())
    .bind(password_hash)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!(
        organization = %config.bootstrap_organization,
        "Bootstrap admin {} created",
        email
    );

    Ok(())
}
