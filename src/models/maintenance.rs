//! Maintenance log models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maps to the `maintenance_logs` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct MaintenanceLog {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub performed_by: Option<Uuid>,
    pub description: String,
    pub cost_cents: i64,
    pub performed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /api/v1/equipment/{id}/maintenance`.
///
/// ```json
/// { "description": "Replaced battery", "cost_cents": 8900 }
/// ```
///
/// `performed_at` defaults to now.
#[derive(Debug, Deserialize)]
pub struct CreateMaintenanceLogRequest {
    pub description: String,

    #[serde(default)]
    pub cost_cents: i64,

    pub performed_at: Option<DateTime<Utc>>,
}
