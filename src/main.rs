//! Equipment Inventory Service - Main Application Entry Point
//!
//! A REST API for tracking company equipment: who holds what, what it cost,
//! how it was maintained, and how new equipment gets requested and approved.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: Session cookie, token stored as SHA-256 hash
//! - **Invoice OCR**: Gemini `generateContent` over reqwest
//! - **Notifications**: Outbox table plus signed HTTP mail relay
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations and create the bootstrap admin
//! 4. Build HTTP router with routes and middleware
//! 5. Start server on configured port

mod app;
mod config;
mod db;
mod error;
mod extract;
mod handlers;
mod middleware;
mod models;
mod services;
mod validation;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    if config.gemini_api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY not set, invoice processing is disabled");
    }
    if config.mail_relay_url.is_none() {
        tracing::warn!("MAIL_RELAY_URL not set, notifications stay in the outbox");
    }

    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    db::bootstrap_admin(&pool, &config).await?;

    tokio::fs::create_dir_all(config.upload_dir.join("photos")).await?;

    let addr = format!("0.0.0.0:{}", config.server_port);
    let state = app::AppState::new(pool, config)?;
    let app = app::router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
