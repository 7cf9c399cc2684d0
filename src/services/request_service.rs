//! Equipment request service.
//!
//! Loads and persists requests around the pure rules in `services::workflow`.
//!
//! # Process (every transition)
//!
//! 1. Lock the request row (`SELECT ... FOR UPDATE`) inside a transaction
//! 2. Ask the workflow for the transition
//! 3. Update the row, guarded by the status it was read with
//! 4. Append an `equipment_request_events` row
//! 5. Commit, then queue notifications
//!
//! # Visibility
//!
//! Requesters see their own requests, team leads also those of their team,
//! admins every request of the organization. Invisible requests are reported
//! as not found.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    app::AppState,
    db::DbPool,
    error::AppError,
    middleware::auth::AuthUser,
    models::{
        notification::{Template, TemplateContext},
        request::{
            ApprovalStage, CreateEquipmentRequestRequest, EquipmentRequest, FulfillRequest, RequestEvent,
            RequestEventKind, RequestFilter, RequestStatus,
        },
        user::{Role, User},
    },
    services::{
        equipment_service::{self, NewEquipment},
        notification_service, user_service,
        workflow::{self, Decision, RequestParties, Requester, Route, Transition},
    },
    validation::{Validator, clean_optional},
};

/// Whether `user` may see `request`.
pub fn is_visible_to(user: &AuthUser, request: &EquipmentRequest) -> bool {
    user.is_admin()
        || request.requester_id == user.id
        || (user.role == Role::TeamLead
            && request.team_id.is_some()
            && request.team_id == user.team_id)
}

/// Submit a new equipment request.
///
/// The approval route is planned here and stored on the row. Requests needing
/// no approval (admins' own) start out `approved`.
pub async fn submit_request(
    state: &AppState,
    user: &AuthUser,
    request: CreateEquipmentRequestRequest,
) -> Result<EquipmentRequest, AppError> {
    Validator::new()
        .required("equipment_name", &request.equipment_name, 200)
        .required("category", &request.category, 100)
        .required("justification", &request.justification, 5000)
        .non_negative("estimated_price_cents", Some(request.estimated_price_cents))
        .finish()?;

    let requester = Requester {
        id: user.id,
        role: user.role,
        team_lead_id: user_service::team_lead_of(&state.pool, user.team_id).await?,
    };
    let route = Route::plan(
        &requester,
        request.estimated_price_cents,
        &state.approval_policy(),
    );
    let status = route.initial_status();

    let mut tx = state.pool.begin().await?;

    let created = sqlx::query_as::<_, EquipmentRequest>(
        r#"
        INSERT INTO equipment_requests (organization_id, requester_id, team_id, equipment_name,
                                        category, justification, estimated_price_cents,
                                        requires_team_lead, requires_admin, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(user.organization_id)
    .bind(user.id)
    .bind(user.team_id)
    .bind(request.equipment_name.trim())
    .bind(request.category.trim())
    .bind(request.justification.trim())
    .bind(request.estimated_price_cents)
    .bind(route.requires_team_lead)
    .bind(route.requires_admin)
    .bind(status.as_str())
    .fetch_one(&mut *tx)
    .await?;

    record_event(
        &mut tx,
        created.id,
        RequestEventKind::Submitted,
        Some(user.id),
        None,
        RequestStatus::Pending,
        None,
    )
    .await?;
    if status == RequestStatus::Approved {
        record_event(
            &mut tx,
            created.id,
            RequestEventKind::AutoApproved,
            None,
            Some(RequestStatus::Pending),
            RequestStatus::Approved,
            None,
        )
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        request_id = %created.id,
        status = status.as_str(),
        requires_team_lead = route.requires_team_lead,
        requires_admin = route.requires_admin,
        "Equipment request submitted"
    );

    match route.awaiting(status) {
        Some(stage) => {
            let audience = match stage {
                ApprovalStage::TeamLead => Audience::TeamLead,
                ApprovalStage::Admin => Audience::Admins,
            };
            notify(state, &created, audience, Template::RequestSubmitted).await;
        }
        None => notify(state, &created, Audience::Requester, Template::RequestApproved).await,
    }

    Ok(created)
}

pub async fn list_requests(
    pool: &DbPool,
    user: &AuthUser,
    filter: RequestFilter,
) -> Result<Vec<EquipmentRequest>, AppError> {
    let team_id = if user.role == Role::TeamLead {
        user.team_id
    } else {
        None
    };

    let requests = sqlx::query_as::<_, EquipmentRequest>(
        r#"
        SELECT * FROM equipment_requests
        WHERE organization_id = $1
          AND ($2::text IS NULL OR status = $2)
          AND ($3 OR requester_id = $4 OR ($5::uuid IS NOT NULL AND team_id = $5))
        ORDER BY created_at DESC
        "#,
    )
    .bind(user.organization_id)
    .bind(filter.status.map(RequestStatus::as_str))
    .bind(user.is_admin())
    .bind(user.id)
    .bind(team_id)
    .fetch_all(pool)
    .await?;

    Ok(requests)
}

async fn find_request(
    conn: &mut PgConnection,
    user: &AuthUser,
    request_id: Uuid,
    lock: bool,
) -> Result<EquipmentRequest, AppError> {
    let query = format!(
        "SELECT * FROM equipment_requests WHERE id = $1 AND organization_id = $2{}",
        if lock { " FOR UPDATE" } else { "" }
    );

    let request = sqlx::query_as::<_, EquipmentRequest>(&query)
        .bind(request_id)
        .bind(user.organization_id)
        .fetch_optional(conn)
        .await?
        .filter(|request| is_visible_to(user, request))
        .ok_or(AppError::NotFound("request"))?;

    Ok(request)
}

pub async fn get_request(
    pool: &DbPool,
    user: &AuthUser,
    request_id: Uuid,
) -> Result<EquipmentRequest, AppError> {
    let mut conn = pool.acquire().await?;
    find_request(&mut conn, user, request_id, false).await
}

/// Audit trail of a request, oldest first.
pub async fn list_events(
    pool: &DbPool,
    user: &AuthUser,
    request_id: Uuid,
) -> Result<Vec<RequestEvent>, AppError> {
    get_request(pool, user, request_id).await?;

    let events = sqlx::query_as::<_, RequestEvent>(
        "SELECT * FROM equipment_request_events WHERE request_id = $1 ORDER BY created_at",
    )
    .bind(request_id)
    .fetch_all(pool)
    .await?;

    Ok(events)
}

async fn record_event(
    conn: &mut PgConnection,
    request_id: Uuid,
    event: RequestEventKind,
    actor_id: Option<Uuid>,
    from: Option<RequestStatus>,
    to: RequestStatus,
    comment: Option<String>,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO equipment_request_events (request_id, event, actor_id, from_status, to_status, comment)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(request_id)
    .bind(event.as_str())
    .bind(actor_id)
    .bind(from.map(RequestStatus::as_str))
    .bind(to.as_str())
    .bind(clean_optional(comment))
    .execute(conn)
    .await?;

    Ok(())
}

/// Persist a transition's status change, guarded by the status it started from.
async fn apply_transition(
    conn: &mut PgConnection,
    request_id: Uuid,
    transition: &Transition,
    actor_id: Uuid,
    rejection_reason: Option<&str>,
    fulfilled_equipment_id: Option<Uuid>,
) -> Result<EquipmentRequest, AppError> {
    sqlx::query_as::<_, EquipmentRequest>(
        r#"
        UPDATE equipment_requests
        SET status = $2,
            team_lead_id = CASE WHEN $4 THEN $3 ELSE team_lead_id END,
            team_lead_decided_at = CASE WHEN $4 THEN NOW() ELSE team_lead_decided_at END,
            admin_id = CASE WHEN $5 THEN $3 ELSE admin_id END,
            admin_decided_at = CASE WHEN $5 THEN NOW() ELSE admin_decided_at END,
            rejection_reason = COALESCE($6, rejection_reason),
            fulfilled_equipment_id = COALESCE($7, fulfilled_equipment_id),
            updated_at = NOW()
        WHERE id = $1 AND status = $8
        RETURNING *
        "#,
    )
    .bind(request_id)
    .bind(transition.to.as_str())
    .bind(actor_id)
    .bind(transition.stage == Some(ApprovalStage::TeamLead))
    .bind(transition.stage == Some(ApprovalStage::Admin))
    .bind(rejection_reason)
    .bind(fulfilled_equipment_id)
    .bind(transition.from.as_str())
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::Conflict("Request was changed concurrently".to_string()))
}

/// Approve or reject a request as its team lead or as an admin.
///
/// # Errors
///
/// - `Forbidden`: caller is neither the request's team lead nor an admin
/// - `Conflict`: request already decided, or waiting for the admin stage
/// - `Validation`: rejection without a reason
pub async fn decide_request(
    state: &AppState,
    user: &AuthUser,
    request_id: Uuid,
    decision: Decision,
    comment: Option<String>,
) -> Result<EquipmentRequest, AppError> {
    if let Decision::Reject { ref reason } = decision {
        Validator::new()
            .optional("reason", Some(reason.as_str()), 2000)
            .finish()?;
    }
    Validator::new()
        .optional("comment", comment.as_deref(), 2000)
        .finish()?;

    let mut tx = state.pool.begin().await?;
    let current = find_request(&mut tx, user, request_id, true).await?;

    let parties = RequestParties {
        requester_id: current.requester_id,
        team_lead_id: user_service::team_lead_of(&state.pool, current.team_id).await?,
    };
    let route = Route {
        requires_team_lead: current.requires_team_lead,
        requires_admin: current.requires_admin,
    };

    let transition = workflow::decide(current.status(), route, user.actor(), parties, &decision)?;

    let reason = match &decision {
        Decision::Reject { reason } => Some(reason.trim()),
        Decision::Approve => None,
    };
    let updated =
        apply_transition(&mut tx, request_id, &transition, user.id, reason, None).await?;

    let comment = match &decision {
        Decision::Reject { reason } => Some(reason.trim().to_string()),
        Decision::Approve => comment,
    };
    record_event(
        &mut tx,
        request_id,
        transition.event,
        Some(user.id),
        Some(transition.from),
        transition.to,
        comment,
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        request_id = %request_id,
        event = transition.event.as_str(),
        status = transition.to.as_str(),
        "Equipment request decided"
    );

    match transition.to {
        RequestStatus::TeamLeadApproved => {
            notify(state, &updated, Audience::Admins, Template::RequestAwaitingAdmin).await
        }
        RequestStatus::Approved => {
            notify(state, &updated, Audience::Requester, Template::RequestApproved).await
        }
        RequestStatus::Rejected => {
            notify(state, &updated, Audience::Requester, Template::RequestRejected).await
        }
        _ => {}
    }

    Ok(updated)
}

/// Hand over equipment for an approved request. Admin only.
///
/// With `equipment_id` the given available item is assigned to the requester;
/// otherwise a new item is created from the request and assigned.
pub async fn fulfill_request(
    state: &AppState,
    user: &AuthUser,
    request_id: Uuid,
    body: FulfillRequest,
) -> Result<EquipmentRequest, AppError> {
    Validator::new()
        .optional("serial_number", body.serial_number.as_deref(), 100)
        .non_negative("purchase_price_cents", body.purchase_price_cents)
        .finish()?;

    let mut tx = state.pool.begin().await?;
    let current = find_request(&mut tx, user, request_id, true).await?;
    let transition = workflow::fulfill(current.status(), user.actor())?;

    let equipment_id = match body.equipment_id {
        Some(equipment_id) => equipment_id,
        None => {
            let equipment = equipment_service::insert_equipment(
                &mut tx,
                user.organization_id,
                Some(user.id),
                NewEquipment {
                    name: current.equipment_name.clone(),
                    serial_number: body.serial_number,
                    category: current.category.clone(),
                    purchase_date: body.purchase_date,
                    purchase_price_cents: Some(
                        body.purchase_price_cents
                            .unwrap_or(current.estimated_price_cents),
                    ),
                    notes: None,
                    invoice_id: None,
                },
            )
            .await?;
            equipment.id
        }
    };

    let (equipment, _) = equipment_service::assign_in(
        &mut tx,
        user.organization_id,
        user.id,
        equipment_id,
        current.requester_id,
        Some(format!("Fulfils request {}", current.id)),
    )
    .await?;

    let updated = apply_transition(
        &mut tx,
        request_id,
        &transition,
        user.id,
        None,
        Some(equipment.id),
    )
    .await?;
    record_event(
        &mut tx,
        request_id,
        transition.event,
        Some(user.id),
        Some(transition.from),
        transition.to,
        None,
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        request_id = %request_id,
        equipment_id = %equipment.id,
        "Equipment request fulfilled"
    );

    notify_with(
        state,
        &updated,
        Audience::Requester,
        Template::RequestFulfilled,
        |ctx| ctx.serial_number = equipment.serial_number.clone(),
    )
    .await;

    Ok(updated)
}

/// Withdraw an undecided request. Requester only.
///
/// Approvers of the stage that was awaited are told they need not decide.
pub async fn cancel_request(
    state: &AppState,
    user: &AuthUser,
    request_id: Uuid,
) -> Result<EquipmentRequest, AppError> {
    let mut tx = state.pool.begin().await?;
    let current = find_request(&mut tx, user, request_id, true).await?;

    let parties = RequestParties {
        requester_id: current.requester_id,
        team_lead_id: None,
    };
    let transition = workflow::cancel(current.status(), user.actor(), parties)?;

    let updated = apply_transition(&mut tx, request_id, &transition, user.id, None, None).await?;
    record_event(
        &mut tx,
        request_id,
        transition.event,
        Some(user.id),
        Some(transition.from),
        transition.to,
        None,
    )
    .await?;

    tx.commit().await?;

    tracing::info!(request_id = %request_id, "Equipment request cancelled");

    let route = Route {
        requires_team_lead: current.requires_team_lead,
        requires_admin: current.requires_admin,
    };
    match route.awaiting(transition.from) {
        Some(ApprovalStage::TeamLead) => {
            notify(state, &updated, Audience::TeamLead, Template::RequestCancelled).await
        }
        Some(ApprovalStage::Admin) => {
            notify(state, &updated, Audience::Admins, Template::RequestCancelled).await
        }
        None => {}
    }

    Ok(updated)
}

/// Who receives a request notification.
#[derive(Debug, Clone, Copy)]
enum Audience {
    Requester,
    TeamLead,
    Admins,
}

async fn notify(
    state: &AppState,
    request: &EquipmentRequest,
    audience: Audience,
    template: Template,
) {
    notify_with(state, request, audience, template, |_| {}).await
}

/// Resolve recipients and queue a notification. Lookup failures are logged.
async fn notify_with(
    state: &AppState,
    request: &EquipmentRequest,
    audience: Audience,
    template: Template,
    customize: impl FnOnce(&mut TemplateContext),
) {
    let recipients = match recipients(&state.pool, request, audience).await {
        Ok(recipients) => recipients,
        Err(e) => {
            tracing::error!(
                request_id = %request.id,
                "Failed to resolve recipients for {}: {:?}",
                template.as_str(),
                e
            );
            return;
        }
    };

    let requester_name = match user_service::get_user(
        &state.pool,
        request.organization_id,
        request.requester_id,
    )
    .await
    {
        Ok(requester) => requester.name,
        Err(_) => String::new(),
    };

    let mut ctx = TemplateContext {
        requester_name,
        equipment_name: request.equipment_name.clone(),
        estimated_price_cents: Some(request.estimated_price_cents),
        reason: request.rejection_reason.clone(),
        request_id: Some(request.id),
        ..Default::default()
    };
    customize(&mut ctx);

    notification_service::dispatch(state, request.organization_id, recipients, template, ctx);
}

async fn recipients(
    pool: &DbPool,
    request: &EquipmentRequest,
    audience: Audience,
) -> Result<Vec<User>, AppError> {
    let user_ids = match audience {
        Audience::Requester => vec![request.requester_id],
        Audience::TeamLead => user_service::team_lead_of(pool, request.team_id)
            .await?
            .into_iter()
            .collect(),
        Audience::Admins => {
            return user_service::users_with_role(pool, request.organization_id, Role::Admin)
                .await;
        }
    };

    let mut users = Vec::with_capacity(user_ids.len());
    for id in user_ids {
        let user = user_service::get_user(pool, request.organization_id, id).await?;
        if user.is_active {
            users.push(user);
        }
    }
    Ok(users)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        app::test_support::{db_state, seed_organization, seed_team, seed_user},
        models::user::UpdateUserRequest,
    };
    use chrono::Utc;
    use sqlx::PgPool;

    fn auth_user(role: Role, team_id: Option<Uuid>) -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            team_id,
            email: "someone@example.com".to_string(),
            name: "Someone".to_string(),
            role,
            session_id: Uuid::new_v4(),
        }
    }

    fn request(requester_id: Uuid, team_id: Option<Uuid>) -> EquipmentRequest {
        EquipmentRequest {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            requester_id,
            team_id,
            equipment_name: "Monitor".to_string(),
            category: "monitor".to_string(),
            justification: "Second screen".to_string(),
            estimated_price_cents: 32_900,
            requires_team_lead: true,
            requires_admin: false,
            status: "pending".to_string(),
            team_lead_id: None,
            team_lead_decided_at: None,
            admin_id: None,
            admin_decided_at: None,
            rejection_reason: None,
            fulfilled_equipment_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn requesters_see_their_own_requests() {
        let user = auth_user(Role::User, None);
        assert!(is_visible_to(&user, &request(user.id, None)));
        assert!(!is_visible_to(&user, &request(Uuid::new_v4(), None)));
    }

    #[test]
    fn team_leads_see_their_team() {
        let team = Uuid::new_v4();
        let lead = auth_user(Role::TeamLead, Some(team));

        assert!(is_visible_to(&lead, &request(Uuid::new_v4(), Some(team))));
        assert!(!is_visible_to(&lead, &request(Uuid::new_v4(), Some(Uuid::new_v4()))));
        assert!(!is_visible_to(&lead, &request(Uuid::new_v4(), None)));
    }

    #[test]
    fn plain_users_do_not_see_teammates() {
        let team = Uuid::new_v4();
        let user = auth_user(Role::User, Some(team));
        assert!(!is_visible_to(&user, &request(Uuid::new_v4(), Some(team))));
    }

    #[test]
    fn admins_see_everything() {
        let admin = auth_user(Role::Admin, None);
        assert!(is_visible_to(&admin, &request(Uuid::new_v4(), Some(Uuid::new_v4()))));
    }

    /// Admin, team lead and a member of the lead's team.
    async fn staffed_team(pool: &PgPool) -> (AuthUser, AuthUser, AuthUser) {
        let org = seed_organization(pool).await;
        let team = seed_team(pool, org, "Design").await;
        let admin = seed_user(pool, org, None, Role::Admin).await;
        let lead = seed_user(pool, org, Some(team), Role::TeamLead).await;
        let member = seed_user(pool, org, Some(team), Role::User).await;
        user_service::set_team_lead(pool, org, team, lead.id).await.unwrap();
        (admin, lead, member)
    }

    fn monitor(estimated_price_cents: i64) -> CreateEquipmentRequestRequest {
        CreateEquipmentRequestRequest {
            equipment_name: "27\" monitor".to_string(),
            category: "monitor".to_string(),
            justification: "Second screen for design reviews".to_string(),
            estimated_price_cents,
        }
    }

    async fn event_names(pool: &PgPool, user: &AuthUser, request_id: Uuid) -> Vec<String> {
        list_events(pool, user, request_id)
            .await
            .unwrap()
            .into_iter()
            .map(|event| event.event)
            .collect()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn expensive_request_walks_both_stages_and_is_fulfilled(pool: PgPool) {
        let state = db_state(pool.clone());
        let (admin, lead, member) = staffed_team(&pool).await;

        let submitted = submit_request(&state, &member, monitor(120_000)).await.unwrap();
        assert_eq!(submitted.status(), RequestStatus::Pending);
        assert!(submitted.requires_team_lead);
        assert!(submitted.requires_admin);

        let after_lead = decide_request(
            &state,
            &lead,
            submitted.id,
            Decision::Approve,
            Some("Fine by me".to_string()),
        )
        .await
        .unwrap();
        assert_eq!(after_lead.status(), RequestStatus::TeamLeadApproved);
        assert_eq!(after_lead.team_lead_id, Some(lead.id));
        assert!(after_lead.team_lead_decided_at.is_some());

        let approved = decide_request(&state, &admin, submitted.id, Decision::Approve, None)
            .await
            .unwrap();
        assert_eq!(approved.status(), RequestStatus::Approved);
        assert_eq!(approved.admin_id, Some(admin.id));

        let fulfilled = fulfill_request(
            &state,
            &admin,
            submitted.id,
            FulfillRequest {
                serial_number: Some("MON-77".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(fulfilled.status(), RequestStatus::Fulfilled);

        let equipment_id = fulfilled.fulfilled_equipment_id.unwrap();
        let equipment = equipment_service::get_equipment(&pool, &member, equipment_id)
            .await
            .unwrap();
        assert_eq!(equipment.owner_id, Some(member.id));
        assert_eq!(equipment.serial_number.as_deref(), Some("MON-77"));
        assert_eq!(equipment.purchase_price_cents, Some(120_000));

        assert_eq!(
            event_names(&pool, &member, submitted.id).await,
            ["submitted", "team_lead_approved", "admin_approved", "fulfilled"]
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn rejection_is_stored_with_its_reason(pool: PgPool) {
        let state = db_state(pool.clone());
        let (_, lead, member) = staffed_team(&pool).await;
        let submitted = submit_request(&state, &member, monitor(10_000)).await.unwrap();
        assert!(!submitted.requires_admin);

        let rejected = decide_request(
            &state,
            &lead,
            submitted.id,
            Decision::Reject {
                reason: "  Budget frozen  ".to_string(),
            },
            None,
        )
        .await
        .unwrap();

        assert_eq!(rejected.status(), RequestStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("Budget frozen"));
        assert_eq!(
            event_names(&pool, &member, submitted.id).await,
            ["submitted", "team_lead_rejected"]
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn a_stale_transition_loses_to_the_committed_one(pool: PgPool) {
        let state = db_state(pool.clone());
        let (admin, lead, member) = staffed_team(&pool).await;
        let submitted = submit_request(&state, &member, monitor(10_000)).await.unwrap();

        // Planned against `pending`, then the lead's approval commits first
        let stale = workflow::decide(
            RequestStatus::Pending,
            Route {
                requires_team_lead: true,
                requires_admin: false,
            },
            lead.actor(),
            RequestParties {
                requester_id: member.id,
                team_lead_id: Some(lead.id),
            },
            &Decision::Reject {
                reason: "Too late".to_string(),
            },
        )
        .unwrap();
        decide_request(&state, &lead, submitted.id, Decision::Approve, None)
            .await
            .unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let lost =
            apply_transition(&mut conn, submitted.id, &stale, lead.id, Some("Too late"), None).await;
        assert!(matches!(lost, Err(AppError::Conflict(_))));

        let current = get_request(&pool, &admin, submitted.id).await.unwrap();
        assert_eq!(current.status(), RequestStatus::Approved);
        assert_eq!(current.rejection_reason, None);
        assert_eq!(
            event_names(&pool, &admin, submitted.id).await,
            ["submitted", "team_lead_approved"]
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn a_deactivated_lead_no_longer_routes_requests(pool: PgPool) {
        let state = db_state(pool.clone());
        let (admin, lead, member) = staffed_team(&pool).await;

        user_service::update_user(
            &pool,
            admin.organization_id,
            lead.id,
            UpdateUserRequest {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let submitted = submit_request(&state, &member, monitor(10_000)).await.unwrap();

        assert!(!submitted.requires_team_lead);
        assert!(submitted.requires_admin);
        assert_eq!(submitted.status(), RequestStatus::Pending);
        let team = user_service::get_team(&pool, admin.organization_id, member.team_id.unwrap())
            .await
            .unwrap();
        assert_eq!(team.team_lead_id, None);
    }
}
