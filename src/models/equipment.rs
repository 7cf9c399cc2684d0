//! Equipment data models and API request/response types.
//!
//! This module defines:
//! - `EquipmentStatus`: lifecycle of an equipment item and its allowed manual transitions
//! - `Equipment`: Database entity representing one physical item
//! - `HistoryEntry`: audit trail row written on every state change
//! - Request bodies for create/update/assign/unassign and list filters

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::present;

/// Lifecycle status of an equipment item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentStatus {
    Available,
    Assigned,
    Maintenance,
    Retired,
}

impl EquipmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EquipmentStatus::Available => "available",
            EquipmentStatus::Assigned => "assigned",
            EquipmentStatus::Maintenance => "maintenance",
            EquipmentStatus::Retired => "retired",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "available" => Some(EquipmentStatus::Available),
            "assigned" => Some(EquipmentStatus::Assigned),
            "maintenance" => Some(EquipmentStatus::Maintenance),
            "retired" => Some(EquipmentStatus::Retired),
            _ => None,
        }
    }

    /// Whether a plain update may move equipment from `self` to `next`.
    ///
    /// `assigned` is entered and left only through assign/unassign, which also
    /// maintain the owner. Retired equipment stays retired.
    pub fn can_update_to(self, next: EquipmentStatus) -> bool {
        use EquipmentStatus::*;

        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (Available, Maintenance) | (Maintenance, Available) | (Available | Maintenance, Retired)
        )
    }
}

/// Represents an equipment record from the database.
///
/// # Database Table
///
/// Maps to the `equipment` table. A CHECK constraint keeps `owner_id` set
/// exactly when `status = 'assigned'`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Equipment {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub serial_number: Option<String>,
    pub category: String,
    pub purchase_date: Option<NaiveDate>,

    /// Purchase price in cents
    pub purchase_price_cents: Option<i64>,

    pub status: String,
    pub owner_id: Option<Uuid>,
    pub notes: Option<String>,

    /// Invoice this item was created from, if any
    pub invoice_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Equipment {
    pub fn status(&self) -> EquipmentStatus {
        EquipmentStatus::from_db(&self.status).unwrap_or(EquipmentStatus::Retired)
    }
}

/// Column list shared by every equipment query.
pub const EQUIPMENT_COLUMNS: &str = "id, organization_id, name, serial_number, category, \
     purchase_date, purchase_price_cents, status, owner_id, notes, invoice_id, created_at, updated_at";

/// Request body for creating equipment.
///
/// ```json
/// {
///   "name": "ThinkPad X1 Carbon",
///   "serial_number": "PF-12345",
///   "category": "laptop",
///   "purchase_date": "2025-03-14",
///   "purchase_price_cents": 189900
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateEquipmentRequest {
    pub name: String,
    pub serial_number: Option<String>,
    pub category: String,
    pub purchase_date: Option<NaiveDate>,
    pub purchase_price_cents: Option<i64>,
    pub notes: Option<String>,
}

/// Partial update of an equipment item.
///
/// Nullable columns use `Option<Option<_>>`: absent leaves the value alone,
/// `null` clears it.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateEquipmentRequest {
    pub name: Option<String>,

    #[serde(default, deserialize_with = "present")]
    pub serial_number: Option<Option<String>>,

    pub category: Option<String>,

    #[serde(default, deserialize_with = "present")]
    pub purchase_date: Option<Option<NaiveDate>>,

    #[serde(default, deserialize_with = "present")]
    pub purchase_price_cents: Option<Option<i64>>,

    #[serde(default, deserialize_with = "present")]
    pub notes: Option<Option<String>>,

    pub status: Option<EquipmentStatus>,
}

#[derive(Debug, Deserialize)]
pub struct AssignEquipmentRequest {
    pub user_id: Uuid,
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UnassignEquipmentRequest {
    pub note: Option<String>,
}

/// Query string filters for `GET /api/v1/equipment`.
#[derive(Debug, Default, Deserialize)]
pub struct EquipmentFilter {
    pub status: Option<EquipmentStatus>,
    pub category: Option<String>,
    pub owner_id: Option<Uuid>,

    /// Case-insensitive substring of name or serial number
    pub q: Option<String>,
}

/// Response body for equipment endpoints.
#[derive(Debug, Serialize)]
pub struct EquipmentResponse {
    pub id: Uuid,
    pub name: String,
    pub serial_number: Option<String>,
    pub category: String,
    pub purchase_date: Option<NaiveDate>,
    pub purchase_price_cents: Option<i64>,
    pub status: EquipmentStatus,
    pub owner_id: Option<Uuid>,
    pub notes: Option<String>,
    pub invoice_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Equipment> for EquipmentResponse {
    fn from(equipment: Equipment) -> Self {
        Self {
            status: equipment.status(),
            id: equipment.id,
            name: equipment.name,
            serial_number: equipment.serial_number,
            category: equipment.category,
            purchase_date: equipment.purchase_date,
            purchase_price_cents: equipment.purchase_price_cents,
            owner_id: equipment.owner_id,
            notes: equipment.notes,
            invoice_id: equipment.invoice_id,
            created_at: equipment.created_at,
            updated_at: equipment.updated_at,
        }
    }
}

/// Kind of change recorded in `equipment_history`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryAction {
    Created,
    Updated,
    Assigned,
    Unassigned,
    MaintenanceStarted,
    MaintenanceFinished,
    MaintenanceLogged,
    Retired,
}

impl HistoryAction {
    pub fn as_str(self) -> &'static str {
        match self {
            HistoryAction::Created => "created",
            HistoryAction::Updated => "updated",
            HistoryAction::Assigned => "assigned",
            HistoryAction::Unassigned => "unassigned",
            HistoryAction::MaintenanceStarted => "maintenance_started",
            HistoryAction::MaintenanceFinished => "maintenance_finished",
            HistoryAction::MaintenanceLogged => "maintenance_logged",
            HistoryAction::Retired => "retired",
        }
    }

    /// History action for a manual status change, if it deserves its own entry.
    pub fn for_status_change(from: EquipmentStatus, to: EquipmentStatus) -> Option<Self> {
        match (from, to) {
            (_, EquipmentStatus::Retired) if from != to => Some(HistoryAction::Retired),
            (EquipmentStatus::Available, EquipmentStatus::Maintenance) => {
                Some(HistoryAction::MaintenanceStarted)
            }
            (EquipmentStatus::Maintenance, EquipmentStatus::Available) => {
                Some(HistoryAction::MaintenanceFinished)
            }
            _ => None,
        }
    }
}

/// One row of an equipment item's audit trail.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub action: String,
    pub actor_id: Option<Uuid>,
    pub from_user_id: Option<Uuid>,
    pub to_user_id: Option<Uuid>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}
