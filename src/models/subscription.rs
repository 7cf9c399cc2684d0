//! Subscription models (recurring software and service costs).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    #[default]
    Monthly,
    Yearly,
}

impl BillingCycle {
    pub fn as_str(self) -> &'static str {
        match self {
            BillingCycle::Monthly => "monthly",
            BillingCycle::Yearly => "yearly",
        }
    }

    /// Lenient parse used for OCR output ("annual", "Yearly", "per year" ...).
    /// Anything unrecognized is treated as monthly.
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v.contains("year") || v.contains("annual") => BillingCycle::Yearly,
            _ => BillingCycle::Monthly,
        }
    }

    /// Cost of one cycle expressed per month, rounded to the nearest cent.
    pub fn monthly_cents(self, cost_cents: i64) -> i64 {
        match self {
            BillingCycle::Monthly => cost_cents,
            BillingCycle::Yearly => (cost_cents + 6) / 12,
        }
    }
}

/// Maps to the `subscriptions` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Subscription {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub organization_id: Uuid,
    pub invoice_id: Option<Uuid>,
    pub name: String,
    pub vendor: Option<String>,
    pub cost_cents: i64,
    pub billing_cycle: String,
    pub renewal_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub name: String,
    pub vendor: Option<String>,
    pub cost_cents: i64,

    #[serde(default)]
    pub billing_cycle: BillingCycle,

    pub renewal_date: Option<NaiveDate>,
}
