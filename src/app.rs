//! Shared application state and the HTTP router.

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{config::Config, db::DbPool, handlers, middleware, services::workflow::ApprovalPolicy};

/// State shared with every handler via `State<AppState>`.
///
/// Cloning is cheap: the pool and the HTTP client are reference counted and
/// the configuration sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<Config>,

    /// Outbound client for the OCR model and the mail relay
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(pool: DbPool, config: Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("equipment-inventory/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            pool,
            config: Arc::new(config),
            http,
        })
    }

    pub fn approval_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy {
            admin_threshold_cents: self.config.admin_approval_threshold_cents,
        }
    }
}

/// Build the full router: public routes plus session-protected `/api/v1` routes.
pub fn router(state: AppState) -> Router {
    // Uploads (photos, invoices) are read as raw bodies; allow them past the
    // default 2 MB limit and let the services enforce the configured maximum.
    let upload_limit = DefaultBodyLimit::max(state.config.max_upload_bytes + 1);

    let authenticated_routes = Router::new()
        // Session
        .route("/api/v1/auth/logout", post(handlers::auth::logout))
        .route("/api/v1/auth/me", get(handlers::auth::me))
        // Users and teams
        .route(
            "/api/v1/users",
            get(handlers::users::list_users).post(handlers::users::create_user),
        )
        .route(
            "/api/v1/users/{id}",
            get(handlers::users::get_user).patch(handlers::users::update_user),
        )
        .route(
            "/api/v1/teams",
            get(handlers::teams::list_teams).post(handlers::teams::create_team),
        )
        .route(
            "/api/v1/teams/{id}/lead",
            put(handlers::teams::set_team_lead).delete(handlers::teams::clear_team_lead),
        )
        // Equipment registry
        .route(
            "/api/v1/equipment",
            get(handlers::equipment::list_equipment).post(handlers::equipment::create_equipment),
        )
        .route(
            "/api/v1/equipment/{id}",
            get(handlers::equipment::get_equipment)
                .patch(handlers::equipment::update_equipment)
                .delete(handlers::equipment::delete_equipment),
        )
        .route(
            "/api/v1/equipment/{id}/assign",
            post(handlers::equipment::assign_equipment),
        )
        .route(
            "/api/v1/equipment/{id}/unassign",
            post(handlers::equipment::unassign_equipment),
        )
        .route(
            "/api/v1/equipment/{id}/history",
            get(handlers::equipment::get_history),
        )
        .route(
            "/api/v1/equipment/{id}/maintenance",
            get(handlers::equipment::list_maintenance).post(handlers::equipment::add_maintenance),
        )
        // Photos
        .route(
            "/api/v1/equipment/{id}/photos",
            get(handlers::photos::list_photos)
                .post(handlers::photos::upload_photo)
                .layer(upload_limit.clone()),
        )
        .route(
            "/api/v1/photos/{id}",
            get(handlers::photos::download_photo).delete(handlers::photos::delete_photo),
        )
        // Equipment requests
        .route(
            "/api/v1/requests",
            get(handlers::requests::list_requests).post(handlers::requests::create_request),
        )
        .route("/api/v1/requests/{id}", get(handlers::requests::get_request))
        .route(
            "/api/v1/requests/{id}/events",
            get(handlers::requests::list_events),
        )
        .route(
            "/api/v1/requests/{id}/approve",
            post(handlers::requests::approve_request),
        )
        .route(
            "/api/v1/requests/{id}/reject",
            post(handlers::requests::reject_request),
        )
        .route(
            "/api/v1/requests/{id}/fulfill",
            post(handlers::requests::fulfill_request),
        )
        .route(
            "/api/v1/requests/{id}/cancel",
            post(handlers::requests::cancel_request),
        )
        // Invoices and subscriptions
        .route(
            "/api/v1/invoices",
            get(handlers::invoices::list_invoices)
                .post(handlers::invoices::process_invoice)
                .layer(upload_limit),
        )
        .route("/api/v1/invoices/{id}", get(handlers::invoices::get_invoice))
        .route(
            "/api/v1/subscriptions",
            get(handlers::subscriptions::list_subscriptions)
                .post(handlers::subscriptions::create_subscription),
        )
        .route(
            "/api/v1/subscriptions/{id}",
            delete(handlers::subscriptions::delete_subscription),
        )
        // Reports
        .route("/api/v1/reports/summary", get(handlers::reports::summary))
        .route(
            "/api/v1/reports/by-category",
            get(handlers::reports::by_category),
        )
        .route("/api/v1/reports/by-team", get(handlers::reports::by_team))
        // Apply session authentication to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::session_middleware,
        ));

    let cors = state.config.cors_allowed_origin.as_deref().and_then(|origin| {
        match HeaderValue::from_str(origin) {
            Ok(origin) => Some(
                CorsLayer::new()
                    .allow_origin(origin)
                    .allow_credentials(true)
                    .allow_methods([
                        Method::GET,
                        Method::POST,
                        Method::PUT,
                        Method::PATCH,
                        Method::DELETE,
                    ])
                    .allow_headers([header::CONTENT_TYPE]),
            ),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS_ALLOWED_ORIGIN {:?}", origin);
                None
            }
        }
    });

    let app = Router::new()
        // Public routes (no authentication required)
        .route("/health", get(handlers::health::health_check))
        .route("/api/v1/auth/login", post(handlers::auth::login))
        .merge(authenticated_routes)
        .layer(TraceLayer::new_for_http());

    let app = match cors {
        Some(cors) => app.layer(cors),
        None => app,
    };

    app.with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::{middleware::auth::AuthUser, models::user::Role};
    use uuid::Uuid;

    /// State over a pool that never connects, for tests that stop before the database.
    pub fn lazy_state() -> AppState {
        let config = crate::config::test_config();
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .expect("lazy pool");
        AppState::new(pool, config).expect("http client")
    }

    /// State over a migrated `#[sqlx::test]` pool. No OCR key, no mail relay.
    pub fn db_state(pool: DbPool) -> AppState {
        AppState::new(pool, crate::config::test_config()).expect("http client")
    }

    pub async fn seed_organization(pool: &DbPool) -> Uuid {
        sqlx::query_scalar("INSERT INTO organizations (name) VALUES ($1) RETURNING id")
            .bind(format!("Org {}", Uuid::new_v4()))
            .fetch_one(pool)
            .await
            .expect("insert organization")
    }

    pub async fn seed_team(pool: &DbPool, organization_id: Uuid, name: &str) -> Uuid {
        sqlx::query_scalar("INSERT INTO teams (organization_id, name) VALUES ($1, $2) RETURNING id")
            .bind(organization_id)
            .bind(name)
            .fetch_one(pool)
            .await
            .expect("insert team")
    }

    /// An active user, returned the way the session middleware would hand it over.
    pub async fn seed_user(
        pool: &DbPool,
        organization_id: Uuid,
        team_id: Option<Uuid>,
        role: Role,
    ) -> AuthUser {
        let email = format!("{}@example.com", Uuid::new_v4().simple());
        let name = format!("{} {}", role.as_str(), &email[..6]);

        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO users (organization_id, team_id, email, name, role, password_hash)
            VALUES ($1, $2, $3, $4, $5, 'not-a-login')
            RETURNING id
            "#,
        )
        .bind(organization_id)
        .bind(team_id)
        .bind(&email)
        .bind(&name)
        .bind(role.as_str())
        .fetch_one(pool)
        .await
        .expect("insert user");

        AuthUser {
            id,
            organization_id,
            team_id,
            email,
            name,
            role,
            session_id: Uuid::new_v4(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    async fn status_of(request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let app = router(test_support::lazy_state());
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn protected_routes_require_a_session() {
        for (method, uri) in [
            ("GET", "/api/v1/equipment"),
            ("POST", "/api/v1/equipment/00000000-0000-0000-0000-000000000001/assign"),
            ("POST", "/api/v1/requests/00000000-0000-0000-0000-000000000001/reject"),
            ("GET", "/api/v1/reports/summary"),
            ("POST", "/api/v1/invoices"),
            ("GET", "/api/v1/auth/me"),
        ] {
            let request = Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            let (status, body) = status_of(request).await;

            assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
            assert_eq!(body["error"]["code"], "unauthenticated");
        }
    }

    #[tokio::test]
    async fn unrelated_cookies_do_not_authenticate() {
        let request = Request::builder()
            .uri("/api/v1/equipment")
            .header("Cookie", "theme=dark; lang=en")
            .body(Body::empty())
            .unwrap();

        let (status, _) = status_of(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_rejects_malformed_json() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/auth/login")
            .header("Content-Type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let (status, body) = status_of(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "invalid_request");
    }

    #[tokio::test]
    async fn login_with_missing_fields_answers_json() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/auth/login")
            .header("Content-Type", "application/json")
            .body(Body::from("{}"))
            .unwrap();

        let (status, body) = status_of(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "invalid_request");
    }

    #[tokio::test]
    async fn login_validates_before_touching_the_database() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/auth/login")
            .header("Content-Type", "application/json")
            .body(Body::from(r#"{"email":"not-an-email","password":""}"#))
            .unwrap();

        let (status, body) = status_of(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "validation_failed");
    }

    #[tokio::test]
    async fn unknown_routes_are_not_found() {
        let request = Request::builder()
            .uri("/api/v2/nothing")
            .body(Body::empty())
            .unwrap();

        let (status, _) = status_of(request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
