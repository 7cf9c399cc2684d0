//! Dashboard reports. Admins and team leads only.
//!
//! Retired equipment is left out of value totals and category reports; it
//! still shows up in the per-status counts.

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthUser,
    models::{
        report::{CategoryReport, StatusCount, SubscriptionCost, SummaryReport, TeamReport},
        subscription::BillingCycle,
        user::Role,
    },
    services::subscription_service,
};

/// Monthly subscription cost from per-cycle sums.
fn monthly_subscription_cents(costs: &[SubscriptionCost]) -> i64 {
    let costs: Vec<(BillingCycle, i64)> = costs
        .iter()
        .map(|row| {
            let cycle = BillingCycle::parse_lenient(Some(&row.billing_cycle));
            (cycle, row.total_cents)
        })
        .collect();
    subscription_service::monthly_total(&costs)
}

pub async fn summary(pool: &DbPool, user: &AuthUser) -> Result<SummaryReport, AppError> {
    user.require(Role::TeamLead)?;
    let org = user.organization_id;

    let equipment_by_status = sqlx::query_as::<_, StatusCount>(
        r#"
        SELECT status, COUNT(*) AS count
        FROM equipment
        WHERE organization_id = $1
        GROUP BY status
        ORDER BY status
        "#,
    )
    .bind(org)
    .fetch_all(pool)
    .await?;

    let equipment_value_cents: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(purchase_price_cents), 0)::BIGINT
        FROM equipment
        WHERE organization_id = $1 AND status <> 'retired'
        "#,
    )
    .bind(org)
    .fetch_one(pool)
    .await?;

    let requests_by_status = sqlx::query_as::<_, StatusCount>(
        r#"
        SELECT status, COUNT(*) AS count
        FROM equipment_requests
        WHERE organization_id = $1
        GROUP BY status
        ORDER BY status
        "#,
    )
    .bind(org)
    .fetch_all(pool)
    .await?;

    let subscription_costs = sqlx::query_as::<_, SubscriptionCost>(
        r#"
        SELECT billing_cycle, COALESCE(SUM(cost_cents), 0)::BIGINT AS total_cents
        FROM subscriptions
        WHERE organization_id = $1
        GROUP BY billing_cycle
        "#,
    )
    .bind(org)
    .fetch_all(pool)
    .await?;

    let maintenance_cost_cents: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(m.cost_cents), 0)::BIGINT
        FROM maintenance_logs m
        JOIN equipment e ON e.id = m.equipment_id
        WHERE e.organization_id = $1
        "#,
    )
    .bind(org)
    .fetch_one(pool)
    .await?;

    Ok(SummaryReport {
        equipment_total: equipment_by_status.iter().map(|row| row.count).sum(),
        equipment_by_status,
        equipment_value_cents,
        requests_by_status,
        monthly_subscription_cents: monthly_subscription_cents(&subscription_costs),
        maintenance_cost_cents,
    })
}

pub async fn by_category(pool: &DbPool, user: &AuthUser) -> Result<Vec<CategoryReport>, AppError> {
    user.require(Role::TeamLead)?;

    let rows = sqlx::query_as::<_, CategoryReport>(
        r#"
        SELECT category,
               COUNT(*) AS count,
               COALESCE(SUM(purchase_price_cents), 0)::BIGINT AS total_value_cents
        FROM equipment
        WHERE organization_id = $1 AND status <> 'retired'
        GROUP BY category
        ORDER BY total_value_cents DESC, category
        "#,
    )
    .bind(user.organization_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Assigned equipment per owner team; owners without a team form "Unassigned".
pub async fn by_team(pool: &DbPool, user: &AuthUser) -> Result<Vec<TeamReport>, AppError> {
    user.require(Role::TeamLead)?;

    let rows = sqlx::query_as::<_, TeamReport>(
        r#"
        SELECT t.id AS team_id,
               COALESCE(t.name, 'Unassigned') AS team_name,
               COUNT(e.id) AS count,
               COALESCE(SUM(e.purchase_price_cents), 0)::BIGINT AS total_value_cents
        FROM equipment e
        JOIN users u ON u.id = e.owner_id
        LEFT JOIN teams t ON t.id = u.team_id
        WHERE e.organization_id = $1 AND e.status = 'assigned'
        GROUP BY t.id, t.name
        ORDER BY total_value_cents DESC, team_name
        "#,
    )
    .bind(user.organization_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cost(cycle: &str, total_cents: i64) -> SubscriptionCost {
        SubscriptionCost {
            billing_cycle: cycle.to_string(),
            total_cents,
        }
    }

    #[test]
    fn yearly_subscriptions_count_one_twelfth() {
        let costs = [cost("monthly", 4_900), cost("yearly", 60_000)];
        assert_eq!(monthly_subscription_cents(&costs), 9_900);
    }

    #[test]
    fn no_subscriptions_cost_nothing() {
        assert_eq!(monthly_subscription_cents(&[]), 0);
    }
}
