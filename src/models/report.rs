//! Reporting rows and dashboard payloads.

use serde::Serialize;
use uuid::Uuid;

/// `(status, count)` grouping row.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

/// Equipment grouped by category.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct CategoryReport {
    pub category: String,
    pub count: i64,
    pub total_value_cents: i64,
}

/// Assigned equipment grouped by the owner's team.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct TeamReport {
    /// `None` for owners without a team
    pub team_id: Option<Uuid>,
    pub team_name: String,
    pub count: i64,
    pub total_value_cents: i64,
}

/// `(billing_cycle, cost)` grouping row used for the monthly subscription total.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubscriptionCost {
    pub billing_cycle: String,
    pub total_cents: i64,
}

/// Top-level dashboard numbers.
#[derive(Debug, Serialize)]
pub struct SummaryReport {
    pub equipment_total: i64,
    pub equipment_by_status: Vec<StatusCount>,
    pub equipment_value_cents: i64,
    pub requests_by_status: Vec<StatusCount>,
    pub monthly_subscription_cents: i64,
    pub maintenance_cost_cents: i64,
}
