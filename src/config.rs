//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use std::path::PathBuf;

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `ADMIN_APPROVAL_THRESHOLD_CENTS` (optional): estimated price at which an
///   equipment request also needs admin approval, defaults to 50000 ($500)
/// - `GEMINI_API_KEY` (optional): enables invoice OCR
/// - `MAIL_RELAY_URL` (optional): enables notification delivery
///
/// Every other field has a default, see the `default_*` functions below.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,

    /// Adds the `Secure` attribute to the session cookie.
    #[serde(default)]
    pub cookie_secure: bool,

    #[serde(default = "default_admin_threshold")]
    pub admin_approval_threshold_cents: i64,

    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    pub gemini_api_key: Option<String>,

    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    #[serde(default = "default_gemini_base_url")]
    pub gemini_base_url: String,

    pub mail_relay_url: Option<String>,

    pub mail_relay_secret: Option<String>,

    #[serde(default = "default_mail_from")]
    pub mail_from: String,

    pub cors_allowed_origin: Option<String>,

    #[serde(default = "default_organization")]
    pub bootstrap_organization: String,

    pub bootstrap_admin_email: Option<String>,

    pub bootstrap_admin_password: Option<String>,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_max_connections() -> u32 {
    5
}

fn default_session_ttl_hours() -> i64 {
    24
}

fn default_admin_threshold() -> i64 {
    50_000
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./uploads")
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_mail_from() -> String {
    "inventory@localhost".to_string()
}

fn default_organization() -> String {
    "Default".to_string()
}

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Env(#[from] envy::Error),

    #[error("{name} is not a valid URL: {source}")]
    InvalidUrl {
        name: &'static str,
        source: url::ParseError,
    },

    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    /// - A configured URL does not parse
    pub fn from_env() -> Result<Self, ConfigError> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are automatically converted: database_url -> DATABASE_URL
        let config = envy::from_env::<Config>()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.gemini_base_url).map_err(|source| ConfigError::InvalidUrl {
            name: "GEMINI_BASE_URL",
            source,
        })?;

        if let Some(ref relay) = self.mail_relay_url {
            url::Url::parse(relay).map_err(|source| ConfigError::InvalidUrl {
                name: "MAIL_RELAY_URL",
                source,
            })?;
        }

        if self.session_ttl_hours <= 0 {
            return Err(ConfigError::NotPositive("SESSION_TTL_HOURS"));
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::NotPositive("MAX_UPLOAD_BYTES"));
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    envy::from_iter::<_, Config>(vec![(
        "DATABASE_URL".to_string(),
        "postgres://localhost/inventory_test".to_string(),
    )])
    .expect("minimal config deserializes")
}
