//! Equipment request HTTP handlers.
//!
//! This module implements the approval workflow endpoints:
//! - GET/POST /api/v1/requests - List visible requests, submit a request
//! - GET /api/v1/requests/{id} - Get a request
//! - GET /api/v1/requests/{id}/events - Audit trail
//! - POST /api/v1/requests/{id}/approve - Approve (team lead or admin)
//! - POST /api/v1/requests/{id}/reject - Reject with a reason (team lead or admin)
//! - POST /api/v1/requests/{id}/fulfill - Hand over equipment (admin)
//! - POST /api/v1/requests/{id}/cancel - Withdraw (requester)

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    app::AppState,
    error::AppError,
    extract::{AppJson, AppPath, AppQuery},
    middleware::auth::AuthUser,
    models::request::{
        ApproveRequest, CreateEquipmentRequestRequest, EquipmentRequestResponse, FulfillRequest,
        RejectRequest, RequestEvent, RequestFilter,
    },
    services::{request_service, workflow::Decision},
};

/// List requests visible to the caller, newest first.
///
/// # Query Parameters
///
/// - `status`: one of `pending`, `team_lead_approved`, `approved`, `rejected`,
///   `fulfilled`, `cancelled`
pub async fn list_requests(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppQuery(filter): AppQuery<RequestFilter>,
) -> Result<Json<Vec<EquipmentRequestResponse>>, AppError> {
    let requests = request_service::list_requests(&state.pool, &auth, filter).await?;
    Ok(Json(
        requests
            .into_iter()
            .map(EquipmentRequestResponse::from)
            .collect(),
    ))
}

/// Submit an equipment request.
///
/// # Request Body
///
/// ```json
/// {
///   "equipment_name": "27\" monitor",
///   "category": "monitor",
///   "justification": "Second screen for design reviews",
///   "estimated_price_cents": 32900
/// }
/// ```
///
/// # Response (201 Created)
///
/// ```json
/// {
///   "id": "770e8400-...",
///   "status": "pending",
///   "awaiting": "team_lead",
///   "requires_team_lead": true,
///   "requires_admin": false,
///   ...
/// }
/// ```
///
/// Admins' own requests come back `approved` right away.
pub async fn create_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppJson(request): AppJson<CreateEquipmentRequestRequest>,
) -> Result<(StatusCode, Json<EquipmentRequestResponse>), AppError> {
    let created = request_service::submit_request(&state, &auth, request).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

pub async fn get_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppPath(request_id): AppPath<Uuid>,
) -> Result<Json<EquipmentRequestResponse>, AppError> {
    let request = request_service::get_request(&state.pool, &auth, request_id).await?;
    Ok(Json(request.into()))
}

pub async fn list_events(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppPath(request_id): AppPath<Uuid>,
) -> Result<Json<Vec<RequestEvent>>, AppError> {
    let events = request_service::list_events(&state.pool, &auth, request_id).await?;
    Ok(Json(events))
}

/// Approve the stage the caller is responsible for.
///
/// The body is optional: `{"comment": "..."}`.
///
/// # Response
///
/// - **Success (200 OK)**: the request, `team_lead_approved` or `approved`
/// - **Error (403)**: caller is neither the request's team lead nor an admin
/// - **Error (409)**: already decided, or waiting for the admin stage
pub async fn approve_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppPath(request_id): AppPath<Uuid>,
    body: Option<AppJson<ApproveRequest>>,
) -> Result<Json<EquipmentRequestResponse>, AppError> {
    let body = body.map(|AppJson(body)| body).unwrap_or_default();

    let request =
        request_service::decide_request(&state, &auth, request_id, Decision::Approve, body.comment)
            .await?;
    Ok(Json(request.into()))
}

/// Reject a request.
///
/// # Request Body
///
/// ```json
/// { "reason": "Budget frozen until Q3" }
/// ```
///
/// A missing or blank reason answers 400.
pub async fn reject_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppPath(request_id): AppPath<Uuid>,
    AppJson(body): AppJson<RejectRequest>,
) -> Result<Json<EquipmentRequestResponse>, AppError> {
    let decision = Decision::Reject {
        reason: body.reason,
    };

    let request =
        request_service::decide_request(&state, &auth, request_id, decision, None).await?;
    Ok(Json(request.into()))
}

/// Fulfil an approved request.
///
/// # Request Body (optional)
///
/// Hand over an existing available item:
///
/// ```json
/// { "equipment_id": "880e8400-..." }
/// ```
///
/// or let a new item be registered from the request:
///
/// ```json
/// { "serial_number": "SN-991", "purchase_date": "2025-04-01", "purchase_price_cents": 31900 }
/// ```
pub async fn fulfill_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppPath(request_id): AppPath<Uuid>,
    body: Option<AppJson<FulfillRequest>>,
) -> Result<Json<EquipmentRequestResponse>, AppError> {
    let body = body.map(|AppJson(body)| body).unwrap_or_default();

    let request = request_service::fulfill_request(&state, &auth, request_id, body).await?;
    Ok(Json(request.into()))
}

pub async fn cancel_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppPath(request_id): AppPath<Uuid>,
) -> Result<Json<EquipmentRequestResponse>, AppError> {
    let request = request_service::cancel_request(&state, &auth, request_id).await?;
    Ok(Json(request.into()))
}
