//! Equipment service - registry, assignment flow, history and maintenance.
//!
//! # Visibility
//!
//! Admins and team leads see every item of their organization; plain users see
//! only items assigned to them. Items a caller cannot see are reported as not
//! found.
//!
//! # Atomicity
//!
//! Every state change and its `equipment_history` row are written in one
//! database transaction, with the equipment row locked `FOR UPDATE` first so
//! two concurrent assignments cannot both succeed.

use std::path::Path;

use chrono::{NaiveDate, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthUser,
    models::{
        equipment::{
            AssignEquipmentRequest, CreateEquipmentRequest, EQUIPMENT_COLUMNS, Equipment,
            EquipmentFilter, EquipmentStatus, HistoryAction, HistoryEntry,
            UnassignEquipmentRequest, UpdateEquipmentRequest,
        },
        maintenance::{CreateMaintenanceLogRequest, MaintenanceLog},
        user::{Role, User},
    },
    services::photo_service,
    validation::{Validator, clean_optional},
};

/// Fields of an equipment record created by the system (fulfilment, invoices).
#[derive(Debug, Clone, Default)]
pub struct NewEquipment {
    pub name: String,
    pub serial_number: Option<String>,
    pub category: String,
    pub purchase_date: Option<NaiveDate>,
    pub purchase_price_cents: Option<i64>,
    pub notes: Option<String>,
    pub invoice_id: Option<Uuid>,
}

/// Whether `user` may see `equipment`.
pub fn is_visible_to(user: &AuthUser, equipment: &Equipment) -> bool {
    user.role >= Role::TeamLead || equipment.owner_id == Some(user.id)
}

/// Whether `user` may add maintenance logs and photos to `equipment`.
pub fn can_contribute(user: &AuthUser, equipment: &Equipment) -> bool {
    user.is_admin() || equipment.owner_id == Some(user.id)
}

pub async fn list_equipment(
    pool: &DbPool,
    user: &AuthUser,
    filter: EquipmentFilter,
) -> Result<Vec<Equipment>, AppError> {
    // Plain users only ever list their own equipment
    let owner_id = if user.role >= Role::TeamLead {
        filter.owner_id
    } else {
        Some(user.id)
    };
    let search = clean_optional(filter.q).map(|q| format!("%{}%", escape_like(&q)));

    let query = format!(
        r#"
        SELECT {EQUIPMENT_COLUMNS}
        FROM equipment
        WHERE organization_id = $1
          AND ($2::text IS NULL OR status = $2)
          AND ($3::text IS NULL OR category = $3)
          AND ($4::uuid IS NULL OR owner_id = $4)
          AND ($5::text IS NULL OR name ILIKE $5 OR serial_number ILIKE $5)
        ORDER BY created_at DESC
        "#
    );

    let equipment = sqlx::query_as::<_, Equipment>(&query)
        .bind(user.organization_id)
        .bind(filter.status.map(EquipmentStatus::as_str))
        .bind(clean_optional(filter.category))
        .bind(owner_id)
        .bind(search)
        .fetch_all(pool)
        .await?;

    Ok(equipment)
}

/// Escape `%`, `_` and `\` so user input matches literally inside ILIKE.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Fetch an equipment item of the organization, ignoring visibility.
pub async fn find_equipment(
    conn: &mut PgConnection,
    organization_id: Uuid,
    equipment_id: Uuid,
    lock: bool,
) -> Result<Equipment, AppError> {
    let query = format!(
        "SELECT {EQUIPMENT_COLUMNS} FROM equipment WHERE id = $1 AND organization_id = $2{}",
        if lock { " FOR UPDATE" } else { "" }
    );

    sqlx::query_as::<_, Equipment>(&query)
        .bind(equipment_id)
        .bind(organization_id)
        .fetch_optional(conn)
        .await?
        .ok_or(AppError::NotFound("equipment"))
}

/// Fetch an equipment item the user is allowed to see.
pub async fn get_equipment(
    pool: &DbPool,
    user: &AuthUser,
    equipment_id: Uuid,
) -> Result<Equipment, AppError> {
    let mut conn = pool.acquire().await?;
    let equipment = find_equipment(&mut conn, user.organization_id, equipment_id, false).await?;

    if !is_visible_to(user, &equipment) {
        return Err(AppError::NotFound("equipment"));
    }
    Ok(equipment)
}

fn validate_fields(
    validator: &mut Validator,
    name: Option<&str>,
    category: Option<&str>,
    serial_number: Option<&str>,
    price: Option<i64>,
    notes: Option<&str>,
) {
    if let Some(name) = name {
        validator.required("name", name, 200);
    }
    if let Some(category) = category {
        validator.required("category", category, 100);
    }
    validator
        .optional("serial_number", serial_number, 100)
        .non_negative("purchase_price_cents", price)
        .optional("notes", notes, 5000);
}

/// Insert an equipment record and its `created` history entry.
pub async fn insert_equipment(
    conn: &mut PgConnection,
    organization_id: Uuid,
    actor_id: Option<Uuid>,
    new: NewEquipment,
) -> Result<Equipment, AppError> {
    let query = format!(
        r#"
        INSERT INTO equipment (organization_id, name, serial_number, category, purchase_date,
                               purchase_price_cents, notes, invoice_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {EQUIPMENT_COLUMNS}
        "#
    );

    let equipment = sqlx::query_as::<_, Equipment>(&query)
        .bind(organization_id)
        .bind(new.name.trim())
        .bind(clean_optional(new.serial_number))
        .bind(new.category.trim())
        .bind(new.purchase_date)
        .bind(new.purchase_price_cents)
        .bind(clean_optional(new.notes))
        .bind(new.invoice_id)
        .fetch_one(&mut *conn)
        .await?;

    record_history(conn, equipment.id, HistoryAction::Created, actor_id, None, None, None).await?;

    Ok(equipment)
}

/// Append an `equipment_history` row.
pub async fn record_history(
    conn: &mut PgConnection,
    equipment_id: Uuid,
    action: HistoryAction,
    actor_id: Option<Uuid>,
    from_user_id: Option<Uuid>,
    to_user_id: Option<Uuid>,
    note: Option<String>,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO equipment_history (equipment_id, action, actor_id, from_user_id, to_user_id, note)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(equipment_id)
    .bind(action.as_str())
    .bind(actor_id)
    .bind(from_user_id)
    .bind(to_user_id)
    .bind(clean_optional(note))
    .execute(conn)
    .await?;

    Ok(())
}

/// Create an equipment item. Admin only.
///
/// New equipment is always `available` with no owner.
pub async fn create_equipment(
    pool: &DbPool,
    user: &AuthUser,
    request: CreateEquipmentRequest,
) -> Result<Equipment, AppError> {
    user.require_admin()?;

    let mut validator = Validator::new();
    validate_fields(
        &mut validator,
        Some(&request.name),
        Some(&request.category),
        request.serial_number.as_deref(),
        request.purchase_price_cents,
        request.notes.as_deref(),
    );
    validator.finish()?;

    let mut tx = pool.begin().await?;
    let equipment = insert_equipment(
        &mut tx,
        user.organization_id,
        Some(user.id),
        NewEquipment {
            name: request.name,
            serial_number: request.serial_number,
            category: request.category,
            purchase_date: request.purchase_date,
            purchase_price_cents: request.purchase_price_cents,
            notes: request.notes,
            invoice_id: None,
        },
    )
    .await?;
    tx.commit().await?;

    tracing::info!(equipment_id = %equipment.id, "Equipment created");

    Ok(equipment)
}

/// Update fields and/or status of an equipment item. Admin only.
///
/// # Errors
///
/// - `Conflict`: the status change is not allowed (see
///   `EquipmentStatus::can_update_to`); assignment goes through `assign`
pub async fn update_equipment(
    pool: &DbPool,
    user: &AuthUser,
    equipment_id: Uuid,
    request: UpdateEquipmentRequest,
) -> Result<Equipment, AppError> {
    user.require_admin()?;

    let mut validator = Validator::new();
    validate_fields(
        &mut validator,
        request.name.as_deref(),
        request.category.as_deref(),
        request.serial_number.as_ref().and_then(|s| s.as_deref()),
        request.purchase_price_cents.flatten(),
        request.notes.as_ref().and_then(|n| n.as_deref()),
    );
    validator.finish()?;

    let mut tx = pool.begin().await?;
    let current = find_equipment(&mut tx, user.organization_id, equipment_id, true).await?;
    let from = current.status();
    let to = request.status.unwrap_or(from);

    if !from.can_update_to(to) {
        return Err(AppError::Conflict(format!(
            "Cannot change equipment status from {} to {}",
            from.as_str(),
            to.as_str()
        )));
    }

    let query = format!(
        r#"
        UPDATE equipment
        SET name = COALESCE($2, name),
            serial_number = CASE WHEN $3 THEN $4 ELSE serial_number END,
            category = COALESCE($5, category),
            purchase_date = CASE WHEN $6 THEN $7 ELSE purchase_date END,
            purchase_price_cents = CASE WHEN $8 THEN $9 ELSE purchase_price_cents END,
            notes = CASE WHEN $10 THEN $11 ELSE notes END,
            status = $12,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {EQUIPMENT_COLUMNS}
        "#
    );

    let equipment = sqlx::query_as::<_, Equipment>(&query)
        .bind(equipment_id)
        .bind(request.name.as_deref().map(str::trim))
        .bind(request.serial_number.is_some())
        .bind(clean_optional(request.serial_number.clone().flatten()))
        .bind(request.category.as_deref().map(str::trim))
        .bind(request.purchase_date.is_some())
        .bind(request.purchase_date.flatten())
        .bind(request.purchase_price_cents.is_some())
        .bind(request.purchase_price_cents.flatten())
        .bind(request.notes.is_some())
        .bind(clean_optional(request.notes.clone().flatten()))
        .bind(to.as_str())
        .fetch_one(&mut *tx)
        .await?;

    let action = HistoryAction::for_status_change(from, to).unwrap_or(HistoryAction::Updated);
    record_history(&mut tx, equipment.id, action, Some(user.id), None, None, None).await?;

    tx.commit().await?;

    tracing::info!(
        equipment_id = %equipment.id,
        status = to.as_str(),
        "Equipment updated"
    );

    Ok(equipment)
}

/// Delete an equipment item together with its photo files.
///
/// Admin only; assigned items must be unassigned first. Photo rows go with the
/// equipment row (`ON DELETE CASCADE`); the files are removed after commit.
pub async fn delete_equipment(
    pool: &DbPool,
    upload_dir: &Path,
    user: &AuthUser,
    equipment_id: Uuid,
) -> Result<(), AppError> {
    user.require_admin()?;

    let mut tx = pool.begin().await?;
    let equipment = find_equipment(&mut tx, user.organization_id, equipment_id, true).await?;

    if equipment.status() == EquipmentStatus::Assigned {
        return Err(AppError::Conflict(
            "Assigned equipment must be unassigned before deletion".to_string(),
        ));
    }

    let photo_paths: Vec<String> =
        sqlx::query_scalar("SELECT storage_path FROM equipment_photos WHERE equipment_id = $1")
            .bind(equipment_id)
            .fetch_all(&mut *tx)
            .await?;

    sqlx::query("DELETE FROM equipment WHERE id = $1")
        .bind(equipment_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    // The rows are gone either way; a file that cannot be removed is only logged
    for path in &photo_paths {
        if let Err(e) = photo_service::remove_file(upload_dir, path).await {
            tracing::warn!(equipment_id = %equipment_id, path = %path, "Failed to remove photo file: {}", e);
        }
    }

    tracing::info!(
        equipment_id = %equipment_id,
        photos_removed = photo_paths.len(),
        "Equipment deleted"
    );

    Ok(())
}

/// Set status to `assigned` and owner to the given user, inside an open transaction.
///
/// # Errors
///
/// - `NotFound("user")`: target user is not an active member of the organization
/// - `Conflict`: equipment is not `available`
pub async fn assign_in(
    conn: &mut PgConnection,
    organization_id: Uuid,
    actor_id: Uuid,
    equipment_id: Uuid,
    user_id: Uuid,
    note: Option<String>,
) -> Result<(Equipment, User), AppError> {
    let equipment = find_equipment(conn, organization_id, equipment_id, true).await?;
    if equipment.status() != EquipmentStatus::Available {
        return Err(AppError::Conflict(format!(
            "Equipment is {}, only available equipment can be assigned",
            equipment.status().as_str()
        )));
    }

    let owner = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE id = $1 AND organization_id = $2 AND is_active = true",
    )
    .bind(user_id)
    .bind(organization_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("user"))?;

    let query = format!(
        r#"
        UPDATE equipment
        SET status = 'assigned', owner_id = $2, updated_at = NOW()
        WHERE id = $1 AND status = 'available'
        RETURNING {EQUIPMENT_COLUMNS}
        "#
    );
    let equipment = sqlx::query_as::<_, Equipment>(&query)
        .bind(equipment_id)
        .bind(owner.id)
        .fetch_one(&mut *conn)
        .await?;

    record_history(
        conn,
        equipment.id,
        HistoryAction::Assigned,
        Some(actor_id),
        None,
        Some(owner.id),
        note,
    )
    .await?;

    Ok((equipment, owner))
}

/// Assign available equipment to a user. Admin only.
pub async fn assign_equipment(
    pool: &DbPool,
    user: &AuthUser,
    equipment_id: Uuid,
    request: AssignEquipmentRequest,
) -> Result<(Equipment, User), AppError> {
    user.require_admin()?;
    Validator::new()
        .optional("note", request.note.as_deref(), 2000)
        .finish()?;

    let mut tx = pool.begin().await?;
    let (equipment, owner) = assign_in(
        &mut tx,
        user.organization_id,
        user.id,
        equipment_id,
        request.user_id,
        request.note,
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        equipment_id = %equipment.id,
        owner_id = %owner.id,
        "Equipment assigned"
    );

    Ok((equipment, owner))
}

/// Return assigned equipment to the pool. Admin only.
///
/// Sets status `available` and clears the owner.
pub async fn unassign_equipment(
    pool: &DbPool,
    user: &AuthUser,
    equipment_id: Uuid,
    request: UnassignEquipmentRequest,
) -> Result<Equipment, AppError> {
    user.require_admin()?;
    Validator::new()
        .optional("note", request.note.as_deref(), 2000)
        .finish()?;

    let mut tx = pool.begin().await?;
    let current = find_equipment(&mut tx, user.organization_id, equipment_id, true).await?;
    if current.status() != EquipmentStatus::Assigned {
        return Err(AppError::Conflict(format!(
            "Equipment is {}, only assigned equipment can be unassigned",
            current.status().as_str()
        )));
    }

    let query = format!(
        r#"
        UPDATE equipment
        SET status = 'available', owner_id = NULL, updated_at = NOW()
        WHERE id = $1
        RETURNING {EQUIPMENT_COLUMNS}
        "#
    );
    let equipment = sqlx::query_as::<_, Equipment>(&query)
        .bind(equipment_id)
        .fetch_one(&mut *tx)
        .await?;

    record_history(
        &mut tx,
        equipment.id,
        HistoryAction::Unassigned,
        Some(user.id),
        current.owner_id,
        None,
        request.note,
    )
    .await?;
    tx.commit().await?;

    tracing::info!(equipment_id = %equipment.id, "Equipment unassigned");

    Ok(equipment)
}

pub async fn list_history(
    pool: &DbPool,
    user: &AuthUser,
    equipment_id: Uuid,
) -> Result<Vec<HistoryEntry>, AppError> {
    get_equipment(pool, user, equipment_id).await?;

    let entries = sqlx::query_as::<_, HistoryEntry>(
        "SELECT * FROM equipment_history WHERE equipment_id = $1 ORDER BY created_at DESC",
    )
    .bind(equipment_id)
    .fetch_all(pool)
    .await?;

    Ok(entries)
}

/// Add a maintenance log entry and its history row. Admin or the current owner.
pub async fn add_maintenance_log(
    pool: &DbPool,
    user: &AuthUser,
    equipment_id: Uuid,
    request: CreateMaintenanceLogRequest,
) -> Result<MaintenanceLog, AppError> {
    let equipment = get_equipment(pool, user, equipment_id).await?;
    if !can_contribute(user, &equipment) {
        return Err(AppError::Forbidden);
    }

    Validator::new()
        .required("description", &request.description, 5000)
        .non_negative("cost_cents", Some(request.cost_cents))
        .finish()?;

    let mut tx = pool.begin().await?;

    let log = sqlx::query_as::<_, MaintenanceLog>(
        r#"
        INSERT INTO maintenance_logs (equipment_id, performed_by, description, cost_cents, performed_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(equipment_id)
    .bind(user.id)
    .bind(request.description.trim())
    .bind(request.cost_cents)
    .bind(request.performed_at.unwrap_or_else(Utc::now))
    .fetch_one(&mut *tx)
    .await?;

    record_history(
        &mut tx,
        equipment_id,
        HistoryAction::MaintenanceLogged,
        Some(user.id),
        None,
        None,
        Some(log.description.clone()),
    )
    .await?;

    tx.commit().await?;

    Ok(log)
}

pub async fn list_maintenance_logs(
    pool: &DbPool,
    user: &AuthUser,
    equipment_id: Uuid,
) -> Result<Vec<MaintenanceLog>, AppError> {
    get_equipment(pool, user, equipment_id).await?;

    let logs = sqlx::query_as::<_, MaintenanceLog>(
        "SELECT * FROM maintenance_logs WHERE equipment_id = $1 ORDER BY performed_at DESC",
    )
    .bind(equipment_id)
    .fetch_all(pool)
    .await?;

    Ok(logs)
}
