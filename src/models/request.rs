//! Equipment request models.
//!
//! An equipment request walks through the approval workflow implemented in
//! `services::workflow`. This module holds the persisted shapes:
//! - `RequestStatus`: the status column
//! - `RequestEventKind`: the audit trail vocabulary, including stage outcomes
//!   such as `team_lead_rejected` that collapse into a terminal status
//! - `EquipmentRequest`: Database entity
//! - Request/response bodies

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted status of an equipment request.
///
/// `pending` waits for the first required stage; `team_lead_approved` waits
/// for the admin stage. `approved`, `rejected`, `fulfilled` and `cancelled`
/// are terminal for decisions (`approved` can still be fulfilled).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    TeamLeadApproved,
    Approved,
    Rejected,
    Fulfilled,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::TeamLeadApproved => "team_lead_approved",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Fulfilled => "fulfilled",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(RequestStatus::Pending),
            "team_lead_approved" => Some(RequestStatus::TeamLeadApproved),
            "approved" => Some(RequestStatus::Approved),
            "rejected" => Some(RequestStatus::Rejected),
            "fulfilled" => Some(RequestStatus::Fulfilled),
            "cancelled" => Some(RequestStatus::Cancelled),
            _ => None,
        }
    }

    /// No further approval decision can be taken.
    pub fn is_decided(self) -> bool {
        !matches!(self, RequestStatus::Pending | RequestStatus::TeamLeadApproved)
    }
}

/// One approval step of the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStage {
    TeamLead,
    Admin,
}

/// Entries of a request's audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestEventKind {
    Submitted,
    AutoApproved,
    TeamLeadApproved,
    TeamLeadRejected,
    AdminApproved,
    AdminRejected,
    Fulfilled,
    Cancelled,
}

impl RequestEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestEventKind::Submitted => "submitted",
            RequestEventKind::AutoApproved => "auto_approved",
            RequestEventKind::TeamLeadApproved => "team_lead_approved",
            RequestEventKind::TeamLeadRejected => "team_lead_rejected",
            RequestEventKind::AdminApproved => "admin_approved",
            RequestEventKind::AdminRejected => "admin_rejected",
            RequestEventKind::Fulfilled => "fulfilled",
            RequestEventKind::Cancelled => "cancelled",
        }
    }
}

/// Represents an equipment request record from the database.
///
/// `requires_team_lead` / `requires_admin` are fixed at submission so later
/// changes to teams or the price threshold do not reroute in-flight requests.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EquipmentRequest {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub requester_id: Uuid,
    pub team_id: Option<Uuid>,
    pub equipment_name: String,
    pub category: String,
    pub justification: String,
    pub estimated_price_cents: i64,
    pub requires_team_lead: bool,
    pub requires_admin: bool,
    pub status: String,
    pub team_lead_id: Option<Uuid>,
    pub team_lead_decided_at: Option<DateTime<Utc>>,
    pub admin_id: Option<Uuid>,
    pub admin_decided_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub fulfilled_equipment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EquipmentRequest {
    pub fn status(&self) -> RequestStatus {
        RequestStatus::from_db(&self.status).unwrap_or(RequestStatus::Cancelled)
    }
}

/// Request body for submitting an equipment request.
///
/// ```json
/// {
///   "equipment_name": "27\" monitor",
///   "category": "monitor",
///   "justification": "Second screen for design reviews",
///   "estimated_price_cents": 32900
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateEquipmentRequestRequest {
    pub equipment_name: String,
    pub category: String,
    pub justification: String,
    pub estimated_price_cents: i64,
}

/// Body of an approve call. The comment is stored on the audit trail.
#[derive(Debug, Default, Deserialize)]
pub struct ApproveRequest {
    pub comment: Option<String>,
}

/// Body of a reject call. `reason` must be non-empty after trimming.
#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: String,
}

/// Body of a fulfil call.
///
/// Either hand over existing available equipment (`equipment_id`) or let the
/// service create a new record from the request plus the optional details.
#[derive(Debug, Default, Deserialize)]
pub struct FulfillRequest {
    pub equipment_id: Option<Uuid>,
    pub serial_number: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub purchase_price_cents: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
}

#[derive(Debug, Serialize)]
pub struct EquipmentRequestResponse {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub team_id: Option<Uuid>,
    pub equipment_name: String,
    pub category: String,
    pub justification: String,
    pub estimated_price_cents: i64,
    pub status: RequestStatus,

    /// Stage whose decision is awaited, `None` once decided
    pub awaiting: Option<ApprovalStage>,

    pub requires_team_lead: bool,
    pub requires_admin: bool,
    pub team_lead_id: Option<Uuid>,
    pub team_lead_decided_at: Option<DateTime<Utc>>,
    pub admin_id: Option<Uuid>,
    pub admin_decided_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub fulfilled_equipment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EquipmentRequest> for EquipmentRequestResponse {
    fn from(request: EquipmentRequest) -> Self {
        let status = request.status();
        let route = crate::services::workflow::Route {
            requires_team_lead: request.requires_team_lead,
            requires_admin: request.requires_admin,
        };

        Self {
            id: request.id,
            requester_id: request.requester_id,
            team_id: request.team_id,
            equipment_name: request.equipment_name,
            category: request.category,
            justification: request.justification,
            estimated_price_cents: request.estimated_price_cents,
            status,
            awaiting: route.awaiting(status),
            requires_team_lead: request.requires_team_lead,
            requires_admin: request.requires_admin,
            team_lead_id: request.team_lead_id,
            team_lead_decided_at: request.team_lead_decided_at,
            admin_id: request.admin_id,
            admin_decided_at: request.admin_decided_at,
            rejection_reason: request.rejection_reason,
            fulfilled_equipment_id: request.fulfilled_equipment_id,
            created_at: request.created_at,
            updated_at: request.updated_at,
        }
    }
}

/// One row of `equipment_request_events`.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct RequestEvent {
    pub id: Uuid,
    pub request_id: Uuid,
    pub event: String,
    pub actor_id: Option<Uuid>,
    pub from_status: Option<String>,
    pub to_status: String,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::TeamLeadApproved,
            RequestStatus::Approved,
            RequestStatus::Rejected,
            RequestStatus::Fulfilled,
            RequestStatus::Cancelled,
        ] {
            assert_eq!(RequestStatus::from_db(status.as_str()), Some(status));
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                serde_json::json!(status.as_str())
            );
        }
    }

    #[test]
    fn only_pending_stages_are_undecided() {
        assert!(!RequestStatus::Pending.is_decided());
        assert!(!RequestStatus::TeamLeadApproved.is_decided());
        assert!(RequestStatus::Approved.is_decided());
        assert!(RequestStatus::Rejected.is_decided());
        assert!(RequestStatus::Fulfilled.is_decided());
        assert!(RequestStatus::Cancelled.is_decided());
    }

    #[test]
    fn reject_body_without_reason_deserializes_to_empty() {
        let body: RejectRequest = serde_json::from_str("{}").unwrap();
        assert!(body.reason.is_empty());
    }
}
