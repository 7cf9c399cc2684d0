//! Recurring subscription costs.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthUser,
    models::{
        subscription::{BillingCycle, CreateSubscriptionRequest, Subscription},
        user::Role,
    },
    validation::{Validator, clean_optional},
};

/// Insert a subscription row. Shared with invoice materialization.
pub async fn insert_subscription(
    conn: &mut PgConnection,
    organization_id: Uuid,
    invoice_id: Option<Uuid>,
    request: CreateSubscriptionRequest,
) -> Result<Subscription, AppError> {
    let subscription = sqlx::query_as::<_, Subscription>(
        r#"
        INSERT INTO subscriptions (organization_id, invoice_id, name, vendor, cost_cents,
                                   billing_cycle, renewal_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(organization_id)
    .bind(invoice_id)
    .bind(request.name.trim())
    .bind(clean_optional(request.vendor))
    .bind(request.cost_cents)
    .bind(request.billing_cycle.as_str())
    .bind(request.renewal_date)
    .fetch_one(conn)
    .await?;

    Ok(subscription)
}

/// Create a subscription. Admin only.
pub async fn create_subscription(
    pool: &DbPool,
    user: &AuthUser,
    request: CreateSubscriptionRequest,
) -> Result<Subscription, AppError> {
    user.require_admin()?;
    Validator::new()
        .required("name", &request.name, 200)
        .optional("vendor", request.vendor.as_deref(), 200)
        .non_negative("cost_cents", Some(request.cost_cents))
        .finish()?;

    let mut conn = pool.acquire().await?;
    insert_subscription(&mut conn, user.organization_id, None, request).await
}

/// List subscriptions, soonest renewal first. Admins and team leads.
pub async fn list_subscriptions(
    pool: &DbPool,
    user: &AuthUser,
) -> Result<Vec<Subscription>, AppError> {
    user.require(Role::TeamLead)?;

    let subscriptions = sqlx::query_as::<_, Subscription>(
        r#"
        SELECT * FROM subscriptions
        WHERE organization_id = $1
        ORDER BY renewal_date NULLS LAST, name
        "#,
    )
    .bind(user.organization_id)
    .fetch_all(pool)
    .await?;

    Ok(subscriptions)
}

/// Delete a subscription. Admin only.
pub async fn delete_subscription(
    pool: &DbPool,
    user: &AuthUser,
    subscription_id: Uuid,
) -> Result<(), AppError> {
    user.require_admin()?;

    let result = sqlx::query("DELETE FROM subscriptions WHERE id = $1 AND organization_id = $2")
        .bind(subscription_id)
        .bind(user.organization_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("subscription"));
    }

    Ok(())
}

/// Total monthly cost of all subscriptions, yearly ones spread over twelve months.
pub fn monthly_total(costs: &[(BillingCycle, i64)]) -> i64 {
    costs
        .iter()
        .map(|(cycle, cents)| cycle.monthly_cents(*cents))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monthly_total_normalizes_yearly_costs() {
        let costs = [
            (BillingCycle::Monthly, 1_500),
            (BillingCycle::Yearly, 12_000),
            (BillingCycle::Yearly, 100),
        ];

        // 1500 + 1000 + round(8.33)
        assert_eq!(monthly_total(&costs), 2_508);
        assert_eq!(monthly_total(&[]), 0);
    }
}
