//! Authentication service: password hashing, login and sessions.
//!
//! # Storage
//!
//! - Passwords: Argon2id PHC strings (`$argon2id$v=19$m=...$<salt>$<hash>`)
//!   with a 16-byte random salt and the crate's default cost parameters. The
//!   parameters travel with the hash, so raising them later keeps old hashes
//!   verifiable.
//! - Session tokens: 32 random bytes, hex encoded, handed to the client in the
//!   `session` cookie. Only the SHA-256 of the token is stored, so a leaked
//!   `sessions` table cannot be replayed.

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    config::Config,
    db::DbPool,
    error::AppError,
    middleware::auth::SESSION_COOKIE,
    models::user::User,
};

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>())
        .map_err(|e| AppError::Internal(format!("Failed to encode salt: {e}")))?;

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC string.
///
/// Malformed stored values never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Generate a session token (64 hex characters).
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// SHA-256 of a session token, as stored in `sessions.token_hash`.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// `Set-Cookie` value carrying a new session token.
pub fn session_cookie(token: &str, ttl_hours: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        token,
        ttl_hours * 3600
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that makes the browser drop the session cookie.
pub fn clear_session_cookie(secure: bool) -> String {
    let mut cookie = format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", SESSION_COOKIE);
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Verify credentials and open a session.
///
/// # Returns
///
/// The plaintext session token (only ever seen here and in the cookie) and
/// the user.
///
/// # Errors
///
/// - `InvalidCredentials`: unknown email, inactive user or wrong password.
///   All three look the same to the client.
pub async fn login(
    pool: &DbPool,
    config: &Config,
    email: &str,
    password: &str,
) -> Result<(String, User), AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await?;

    let user = match user {
        Some(user) if user.is_active && verify_password(password, &user.password_hash) => user,
        _ => {
            tracing::info!("Failed login attempt for {}", email);
            return Err(AppError::InvalidCredentials);
        }
    };

    let token = generate_token();
    let expires_at = Utc::now() + Duration::hours(config.session_ttl_hours);

    // Drop this user's expired sessions while we are here
    sqlx::query("DELETE FROM sessions WHERE user_id = $1 AND expires_at <= NOW()")
        .bind(user.id)
        .execute(pool)
        .await?;

    sqlx::query("INSERT INTO sessions (user_id, token_hash, expires_at) VALUES ($1, $2, $3)")
        .bind(user.id)
        .bind(hash_token(&token))
        .bind(expires_at)
        .execute(pool)
        .await?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok((token, user))
}

/// Delete a session.
pub async fn logout(pool: &DbPool, session_id: Uuid) -> Result<(), AppError> {
    sqlx::query("DELETE FROM sessions WHERE id = $1")
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}
