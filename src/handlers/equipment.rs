//! Equipment HTTP handlers.
//!
//! This module implements the equipment registry endpoints:
//! - GET /api/v1/equipment - List (filters: status, category, owner_id, q)
//! - POST /api/v1/equipment - Create (admin)
//! - GET/PATCH/DELETE /api/v1/equipment/{id} - Read, update, delete
//! - POST /api/v1/equipment/{id}/assign - Assign to a user (admin)
//! - POST /api/v1/equipment/{id}/unassign - Return to the pool (admin)
//! - GET /api/v1/equipment/{id}/history - Audit trail
//! - GET/POST /api/v1/equipment/{id}/maintenance - Maintenance log
//!
//! Plain users only ever see equipment assigned to them; everything else is
//! reported as 404.

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
    models::{
        equipment::{
            AssignEquipmentRequest, CreateEquipmentRequest, EquipmentFilter, EquipmentResponse,
            HistoryEntry, UnassignEquipmentRequest, UpdateEquipmentRequest,
        },
        maintenance::{CreateMaintenanceLogRequest, MaintenanceLog},
        notification::{Template, TemplateContext},
    },
    services::{equipment_service, notification_service},
};

/// List equipment visible to the caller.
///
/// # Query Parameters
///
/// - `status`: `available`, `assigned`, `maintenance` or `retired`
/// - `category`: exact category
/// - `owner_id`: owner's user id (ignored for plain users)
/// - `q`: case-insensitive substring of name or serial number
pub async fn list_equipment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppQuery(filter): AppQuery<EquipmentFilter>,
) -> Result<Json<Vec<EquipmentResponse>>, AppError> {
    let equipment = equipment_service::list_equipment(&state.pool, &auth, filter).await?;
    Ok(Json(equipment.into_iter().map(EquipmentResponse::from).collect()))
}

/// Register a new equipment item.
///
/// # Request Body
///
/// ```json
/// {
///   "name": "ThinkPad X1 Carbon",
///   "serial_number": "PF-12345",
///   "category": "laptop",
///   "purchase_date": "2025-03-14",
///   "purchase_price_cents": 189900,
///   "notes": "Gen 11"
/// }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: the item, status `available`
/// - **Error (400)**: validation failures
/// - **Error (403)**: caller is not an admin
/// - **Error (409)**: serial number already registered
pub async fn create_equipment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppJson(request): AppJson<CreateEquipmentRequest>,
) -> Result<(StatusCode, Json<EquipmentResponse>), AppError> {
    let equipment = equipment_service::create_equipment(&state.pool, &auth, request).await?;
    Ok((StatusCode::CREATED, Json(equipment.into())))
}

pub async fn get_equipment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppPath(equipment_id): AppPath<Uuid>,
) -> Result<Json<EquipmentResponse>, AppError> {
    let equipment = equipment_service::get_equipment(&state.pool, &auth, equipment_id).await?;
    Ok(Json(equipment.into()))
}

/// Partially update an item.
///
/// `status` may move between `available` and `maintenance`, or to `retired`.
/// Assignment has its own endpoints; trying to reach or leave `assigned` here
/// answers 409.
pub async fn update_equipment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppPath(equipment_id): AppPath<Uuid>,
    AppJson(request): AppJson<UpdateEquipmentRequest>,
) -> Result<Json<EquipmentResponse>, AppError> {
    let equipment =
        equipment_service::update_equipment(&state.pool, &auth, equipment_id, request).await?;
    Ok(Json(equipment.into()))
}

pub async fn delete_equipment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppPath(equipment_id): AppPath<Uuid>,
) -> Result<StatusCode, AppError> {
    equipment_service::delete_equipment(&state.pool, &state.config.upload_dir, &auth, equipment_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Assign available equipment to a user and notify them.
///
/// # Request Body
///
/// ```json
/// { "user_id": "550e8400-...", "note": "Onboarding kit" }
/// ```
///
/// # Response
///
/// - **Success (200 OK)**: the item, status `assigned`, `owner_id` set
/// - **Error (404)**: equipment, or active user, not found
/// - **Error (409)**: equipment is not `available`
pub async fn assign_equipment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppPath(equipment_id): AppPath<Uuid>,
    AppJson(request): AppJson<AssignEquipmentRequest>,
) -> Result<Json<EquipmentResponse>, AppError> {
    let (equipment, owner) =
        equipment_service::assign_equipment(&state.pool, &auth, equipment_id, request).await?;

    notification_service::dispatch(
        &state,
        auth.organization_id,
        vec![owner],
        Template::EquipmentAssigned,
        TemplateContext {
            equipment_name: equipment.name.clone(),
            serial_number: equipment.serial_number.clone(),
            ..Default::default()
        },
    );

    Ok(Json(equipment.into()))
}

/// Return assigned equipment to the pool. The body (`{"note": "..."}`) is optional.
pub async fn unassign_equipment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppPath(equipment_id): AppPath<Uuid>,
    request: Option<AppJson<UnassignEquipmentRequest>>,
) -> Result<Json<EquipmentResponse>, AppError> {
    let request = request.map(|AppJson(body)| body).unwrap_or_default();

    let equipment =
        equipment_service::unassign_equipment(&state.pool, &auth, equipment_id, request).await?;
    Ok(Json(equipment.into()))
}

pub async fn get_history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppPath(equipment_id): AppPath<Uuid>,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    let history = equipment_service::list_history(&state.pool, &auth, equipment_id).await?;
    Ok(Json(history))
}

pub async fn list_maintenance(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppPath(equipment_id): AppPath<Uuid>,
) -> Result<Json<Vec<MaintenanceLog>>, AppError> {
    let logs = equipment_service::list_maintenance_logs(&state.pool, &auth, equipment_id).await?;
    Ok(Json(logs))
}

/// Record maintenance work. Admin or the current owner.
///
/// # Request Body
///
/// ```json
/// { "description": "Battery replaced", "cost_cents": 8900, "performed_at": "2025-04-02T09:30:00Z" }
/// ```
pub async fn add_maintenance(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppPath(equipment_id): AppPath<Uuid>,
    AppJson(request): AppJson<CreateMaintenanceLogRequest>,
) -> Result<(StatusCode, Json<MaintenanceLog>), AppError> {
    let log =
        equipment_service::add_maintenance_log(&state.pool, &auth, equipment_id, request).await?;
    Ok((StatusCode::CREATED, Json(log)))
}
