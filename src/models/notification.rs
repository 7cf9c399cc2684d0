//! Notification models.
//!
//! Every email is written to the `notifications` outbox before delivery and
//! updated with the relay's answer afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Email templates sent on workflow transitions and assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    RequestSubmitted,
    RequestAwaitingAdmin,
    RequestApproved,
    RequestRejected,
    RequestFulfilled,
    RequestCancelled,
    EquipmentAssigned,
}

impl Template {
    pub fn as_str(self) -> &'static str {
        match self {
            Template::RequestSubmitted => "request_submitted",
            Template::RequestAwaitingAdmin => "request_awaiting_admin",
            Template::RequestApproved => "request_approved",
            Template::RequestRejected => "request_rejected",
            Template::RequestFulfilled => "request_fulfilled",
            Template::RequestCancelled => "request_cancelled",
            Template::EquipmentAssigned => "equipment_assigned",
        }
    }
}

/// Values substituted into a template.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    pub recipient_name: String,
    pub requester_name: String,
    pub equipment_name: String,
    pub estimated_price_cents: Option<i64>,
    pub reason: Option<String>,
    pub request_id: Option<Uuid>,
    pub serial_number: Option<String>,
}

/// A rendered email addressed to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// JSON body POSTed to the mail relay.
#[derive(Debug, Serialize, Deserialize)]
pub struct RelayMessage {
    pub id: Uuid,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub template: String,
    pub created_at: DateTime<Utc>,
}
