//! Approval workflow rules for equipment requests.
//!
//! This module is pure: it decides routes and transitions from plain values and
//! never touches the database. `request_service` loads the rows, asks this
//! module what should happen, and persists the result.
//!
//! # Flow
//!
//! ```text
//! pending ──team lead approves──▶ team_lead_approved ──admin approves──▶ approved ──▶ fulfilled
//!    │  └─team lead approves (no admin stage)────────────────────────────▲
//!    │                                   │
//!    └─team lead / admin rejects──▶ rejected ◀──admin rejects───────────┘
//! ```
//!
//! Which stages apply is decided once, at submission ([`Route::plan`]):
//! - the team-lead stage applies to plain users whose team has a lead other
//!   than themselves
//! - the admin stage applies when the estimated price reaches the threshold,
//!   or when there is no team-lead stage to approve the request at all
//! - admins' own requests skip both stages and are approved immediately
//!
//! Admins may decide any undecided request, which also overrides a pending
//! team-lead stage.

use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        request::{ApprovalStage, RequestEventKind, RequestStatus},
        user::Role,
    },
};

/// Organization-wide approval settings.
#[derive(Debug, Clone, Copy)]
pub struct ApprovalPolicy {
    /// Estimated price (cents) at or above which the admin stage is required
    pub admin_threshold_cents: i64,
}

/// The person submitting a request, as far as routing cares.
#[derive(Debug, Clone, Copy)]
pub struct Requester {
    pub id: Uuid,
    pub role: Role,

    /// Lead of the requester's team, if they have a team with a lead
    pub team_lead_id: Option<Uuid>,
}

/// The person acting on an existing request.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

/// Who is related to an existing request.
#[derive(Debug, Clone, Copy)]
pub struct RequestParties {
    pub requester_id: Uuid,

    /// Current lead of the request's team
    pub team_lead_id: Option<Uuid>,
}

/// Stages a request has to pass, fixed at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub requires_team_lead: bool,
    pub requires_admin: bool,
}

impl Route {
    pub fn plan(requester: &Requester, estimated_price_cents: i64, policy: &ApprovalPolicy) -> Self {
        if requester.role == Role::Admin {
            return Self {
                requires_team_lead: false,
                requires_admin: false,
            };
        }

        let requires_team_lead = requester.role == Role::User
            && requester
                .team_lead_id
                .is_some_and(|lead| lead != requester.id);
        let requires_admin =
            estimated_price_cents >= policy.admin_threshold_cents || !requires_team_lead;

        Self {
            requires_team_lead,
            requires_admin,
        }
    }

    /// Status a freshly submitted request starts in.
    pub fn initial_status(self) -> RequestStatus {
        if self.requires_team_lead || self.requires_admin {
            RequestStatus::Pending
        } else {
            RequestStatus::Approved
        }
    }

    /// Stage whose decision the request is waiting for.
    pub fn awaiting(self, status: RequestStatus) -> Option<ApprovalStage> {
        match status {
            RequestStatus::Pending if self.requires_team_lead => Some(ApprovalStage::TeamLead),
            RequestStatus::Pending if self.requires_admin => Some(ApprovalStage::Admin),
            RequestStatus::TeamLeadApproved if self.requires_admin => Some(ApprovalStage::Admin),
            _ => None,
        }
    }
}

/// An approver's verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject { reason: String },
}

/// Outcome of a workflow step, ready to be persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Stage the actor decided for, `None` for fulfil/cancel
    pub stage: Option<ApprovalStage>,
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub event: RequestEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("request is already {}", .0.as_str())]
    AlreadyDecided(RequestStatus),

    #[error("request is awaiting {} approval", stage_label(.0))]
    WrongStage(ApprovalStage),

    #[error("not allowed to decide this request")]
    NotAnApprover,

    #[error("a rejection reason is required")]
    MissingReason,

    #[error("only approved requests can be fulfilled, request is {}", .0.as_str())]
    NotApproved(RequestStatus),

    #[error("only undecided requests can be cancelled, request is {}", .0.as_str())]
    NotCancellable(RequestStatus),
}

fn stage_label(stage: &ApprovalStage) -> &'static str {
    match stage {
        ApprovalStage::TeamLead => "team lead",
        ApprovalStage::Admin => "admin",
    }
}

impl From<WorkflowError> for AppError {
    fn from(error: WorkflowError) -> Self {
        match error {
            WorkflowError::NotAnApprover => AppError::Forbidden,
            WorkflowError::MissingReason => AppError::Validation(vec![crate::error::FieldError {
                field: "reason".to_string(),
                message: "must not be empty".to_string(),
            }]),
            other => AppError::Conflict(other.to_string()),
        }
    }
}

/// Decide the stage an actor is allowed to act for, then apply the decision.
pub fn decide(
    status: RequestStatus,
    route: Route,
    actor: Actor,
    parties: RequestParties,
    decision: &Decision,
) -> Result<Transition, WorkflowError> {
    let is_team_lead = parties.team_lead_id == Some(actor.id);
    if actor.role != Role::Admin && (!is_team_lead || actor.id == parties.requester_id) {
        return Err(WorkflowError::NotAnApprover);
    }

    let awaiting = route
        .awaiting(status)
        .ok_or(WorkflowError::AlreadyDecided(status))?;

    let stage = if actor.role == Role::Admin {
        ApprovalStage::Admin
    } else if awaiting == ApprovalStage::TeamLead {
        ApprovalStage::TeamLead
    } else {
        return Err(WorkflowError::WrongStage(awaiting));
    };

    if let Decision::Reject { reason } = decision {
        if reason.trim().is_empty() {
            return Err(WorkflowError::MissingReason);
        }
    }

    let (to, event) = match (stage, decision) {
        (ApprovalStage::TeamLead, Decision::Approve) if route.requires_admin => (
            RequestStatus::TeamLeadApproved,
            RequestEventKind::TeamLeadApproved,
        ),
        (ApprovalStage::TeamLead, Decision::Approve) => {
            (RequestStatus::Approved, RequestEventKind::TeamLeadApproved)
        }
        (ApprovalStage::TeamLead, Decision::Reject { .. }) => {
            (RequestStatus::Rejected, RequestEventKind::TeamLeadRejected)
        }
        (ApprovalStage::Admin, Decision::Approve) => {
            (RequestStatus::Approved, RequestEventKind::AdminApproved)
        }
        (ApprovalStage::Admin, Decision::Reject { .. }) => {
            (RequestStatus::Rejected, RequestEventKind::AdminRejected)
        }
    };

    Ok(Transition {
        stage: Some(stage),
        from: status,
        to,
        event,
    })
}

/// Hand over equipment for an approved request. Admin only.
pub fn fulfill(status: RequestStatus, actor: Actor) -> Result<Transition, WorkflowError> {
    if actor.role != Role::Admin {
        return Err(WorkflowError::NotAnApprover);
    }
    if status != RequestStatus::Approved {
        return Err(WorkflowError::NotApproved(status));
    }

    Ok(Transition {
        stage: None,
        from: status,
        to: RequestStatus::Fulfilled,
        event: RequestEventKind::Fulfilled,
    })
}

/// Withdraw an undecided request. Requester only.
pub fn cancel(
    status: RequestStatus,
    actor: Actor,
    parties: RequestParties,
) -> Result<Transition, WorkflowError> {
    if actor.id != parties.requester_id {
        return Err(WorkflowError::NotAnApprover);
    }
    if status.is_decided() {
        return Err(WorkflowError::NotCancellable(status));
    }

    Ok(Transition {
        stage: None,
        from: status,
        to: RequestStatus::Cancelled,
        event: RequestEventKind::Cancelled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: ApprovalPolicy = ApprovalPolicy {
        admin_threshold_cents: 50_000,
    };

    struct People {
        user: Uuid,
        lead: Uuid,
        admin: Uuid,
        outsider: Uuid,
    }

    fn people() -> People {
        People {
            user: Uuid::new_v4(),
            lead: Uuid::new_v4(),
            admin: Uuid::new_v4(),
            outsider: Uuid::new_v4(),
        }
    }

    fn requester(id: Uuid, role: Role, team_lead_id: Option<Uuid>) -> Requester {
        Requester {
            id,
            role,
            team_lead_id,
        }
    }

    fn actor(id: Uuid, role: Role) -> Actor {
        Actor { id, role }
    }

    fn parties(p: &People) -> RequestParties {
        RequestParties {
            requester_id: p.user,
            team_lead_id: Some(p.lead),
        }
    }

    fn reject(reason: &str) -> Decision {
        Decision::Reject {
            reason: reason.to_string(),
        }
    }

    #[test]
    fn cheap_request_with_team_lead_needs_only_team_lead() {
        let p = people();
        let route = Route::plan(&requester(p.user, Role::User, Some(p.lead)), 10_000, &POLICY);

        assert_eq!(
            route,
            Route {
                requires_team_lead: true,
                requires_admin: false
            }
        );
        assert_eq!(route.initial_status(), RequestStatus::Pending);
        assert_eq!(
            route.awaiting(RequestStatus::Pending),
            Some(ApprovalStage::TeamLead)
        );
    }

    #[test]
    fn price_at_threshold_adds_admin_stage() {
        let p = people();
        let route = Route::plan(&requester(p.user, Role::User, Some(p.lead)), 50_000, &POLICY);

        assert!(route.requires_team_lead);
        assert!(route.requires_admin);

        let below = Route::plan(&requester(p.user, Role::User, Some(p.lead)), 49_999, &POLICY);
        assert!(!below.requires_admin);
    }

    #[test]
    fn user_without_team_lead_goes_to_admin() {
        let p = people();
        let route = Route::plan(&requester(p.user, Role::User, None), 100, &POLICY);

        assert!(!route.requires_team_lead);
        assert!(route.requires_admin);
        assert_eq!(
            route.awaiting(RequestStatus::Pending),
            Some(ApprovalStage::Admin)
        );
    }

    #[test]
    fn team_lead_request_skips_own_stage() {
        let p = people();
        let route = Route::plan(&requester(p.lead, Role::TeamLead, Some(p.lead)), 100, &POLICY);

        assert!(!route.requires_team_lead);
        assert!(route.requires_admin);
    }

    #[test]
    fn user_who_leads_own_team_skips_team_lead_stage() {
        let p = people();
        let route = Route::plan(&requester(p.user, Role::User, Some(p.user)), 100, &POLICY);

        assert!(!route.requires_team_lead);
        assert!(route.requires_admin);
    }

    #[test]
    fn admin_request_is_auto_approved() {
        let p = people();
        let route = Route::plan(&requester(p.admin, Role::Admin, None), 1_000_000, &POLICY);

        assert_eq!(route.initial_status(), RequestStatus::Approved);
        assert_eq!(route.awaiting(RequestStatus::Approved), None);
    }

    #[test]
    fn team_lead_approval_finishes_cheap_request() {
        let p = people();
        let route = Route::plan(&requester(p.user, Role::User, Some(p.lead)), 100, &POLICY);

        let t = decide(
            RequestStatus::Pending,
            route,
            actor(p.lead, Role::TeamLead),
            parties(&p),
            &Decision::Approve,
        )
        .unwrap();

        assert_eq!(t.stage, Some(ApprovalStage::TeamLead));
        assert_eq!(t.to, RequestStatus::Approved);
        assert_eq!(t.event, RequestEventKind::TeamLeadApproved);
    }

    #[test]
    fn expensive_request_walks_both_stages() {
        let p = people();
        let route = Route::plan(&requester(p.user, Role::User, Some(p.lead)), 90_000, &POLICY);

        let first = decide(
            RequestStatus::Pending,
            route,
            actor(p.lead, Role::TeamLead),
            parties(&p),
            &Decision::Approve,
        )
        .unwrap();
        assert_eq!(first.to, RequestStatus::TeamLeadApproved);

        // The lead cannot also approve the admin stage
        assert_eq!(
            decide(
                first.to,
                route,
                actor(p.lead, Role::TeamLead),
                parties(&p),
                &Decision::Approve,
            ),
            Err(WorkflowError::WrongStage(ApprovalStage::Admin))
        );

        let second = decide(
            first.to,
            route,
            actor(p.admin, Role::Admin),
            parties(&p),
            &Decision::Approve,
        )
        .unwrap();
        assert_eq!(second.stage, Some(ApprovalStage::Admin));
        assert_eq!(second.to, RequestStatus::Approved);
        assert_eq!(second.event, RequestEventKind::AdminApproved);
    }

    #[test]
    fn rejection_requires_a_reason() {
        let p = people();
        let route = Route::plan(&requester(p.user, Role::User, Some(p.lead)), 100, &POLICY);

        for blank in ["", "   ", "\n\t"] {
            assert_eq!(
                decide(
                    RequestStatus::Pending,
                    route,
                    actor(p.lead, Role::TeamLead),
                    parties(&p),
                    &reject(blank),
                ),
                Err(WorkflowError::MissingReason)
            );
        }

        let t = decide(
            RequestStatus::Pending,
            route,
            actor(p.lead, Role::TeamLead),
            parties(&p),
            &reject("Budget frozen"),
        )
        .unwrap();
        assert_eq!(t.to, RequestStatus::Rejected);
        assert_eq!(t.event, RequestEventKind::TeamLeadRejected);
    }

    #[test]
    fn admin_can_override_team_lead_stage() {
        let p = people();
        let route = Route::plan(&requester(p.user, Role::User, Some(p.lead)), 100, &POLICY);

        let t = decide(
            RequestStatus::Pending,
            route,
            actor(p.admin, Role::Admin),
            parties(&p),
            &reject("Duplicate request"),
        )
        .unwrap();

        assert_eq!(t.stage, Some(ApprovalStage::Admin));
        assert_eq!(t.event, RequestEventKind::AdminRejected);
        assert_eq!(t.to, RequestStatus::Rejected);
    }

    #[test]
    fn strangers_and_requesters_cannot_decide() {
        let p = people();
        let route = Route::plan(&requester(p.user, Role::User, Some(p.lead)), 100, &POLICY);

        for who in [
            actor(p.outsider, Role::User),
            actor(p.outsider, Role::TeamLead),
            actor(p.user, Role::User),
        ] {
            assert_eq!(
                decide(
                    RequestStatus::Pending,
                    route,
                    who,
                    parties(&p),
                    &Decision::Approve
                ),
                Err(WorkflowError::NotAnApprover)
            );
        }
    }

    #[test]
    fn decided_requests_cannot_be_decided_again() {
        let p = people();
        let route = Route::plan(&requester(p.user, Role::User, Some(p.lead)), 90_000, &POLICY);

        for status in [
            RequestStatus::Approved,
            RequestStatus::Rejected,
            RequestStatus::Fulfilled,
            RequestStatus::Cancelled,
        ] {
            assert_eq!(
                decide(
                    status,
                    route,
                    actor(p.admin, Role::Admin),
                    parties(&p),
                    &Decision::Approve
                ),
                Err(WorkflowError::AlreadyDecided(status))
            );
        }
    }

    #[test]
    fn fulfilment_needs_admin_and_approved_status() {
        let p = people();

        assert_eq!(
            fulfill(RequestStatus::Approved, actor(p.lead, Role::TeamLead)),
            Err(WorkflowError::NotAnApprover)
        );
        assert_eq!(
            fulfill(RequestStatus::Pending, actor(p.admin, Role::Admin)),
            Err(WorkflowError::NotApproved(RequestStatus::Pending))
        );

        let t = fulfill(RequestStatus::Approved, actor(p.admin, Role::Admin)).unwrap();
        assert_eq!(t.to, RequestStatus::Fulfilled);
        assert_eq!(t.event, RequestEventKind::Fulfilled);
    }

    #[test]
    fn only_requester_cancels_undecided_requests() {
        let p = people();

        assert_eq!(
            cancel(
                RequestStatus::Pending,
                actor(p.admin, Role::Admin),
                parties(&p)
            ),
            Err(WorkflowError::NotAnApprover)
        );
        assert_eq!(
            cancel(
                RequestStatus::Approved,
                actor(p.user, Role::User),
                parties(&p)
            ),
            Err(WorkflowError::NotCancellable(RequestStatus::Approved))
        );

        let t = cancel(
            RequestStatus::TeamLeadApproved,
            actor(p.user, Role::User),
            parties(&p),
        )
        .unwrap();
        assert_eq!(t.to, RequestStatus::Cancelled);
    }

    #[test]
    fn workflow_errors_map_to_http_errors() {
        assert!(matches!(
            AppError::from(WorkflowError::NotAnApprover),
            AppError::Forbidden
        ));
        assert!(matches!(
            AppError::from(WorkflowError::MissingReason),
            AppError::Validation(_)
        ));
        match AppError::from(WorkflowError::WrongStage(ApprovalStage::Admin)) {
            AppError::Conflict(msg) => assert_eq!(msg, "request is awaiting admin approval"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
