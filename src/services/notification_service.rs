//! Email notifications for workflow transitions and assignments.
//!
//! # Delivery
//!
//! 1. Render the template for each recipient
//! 2. Insert a `pending` row into the `notifications` outbox
//! 3. POST the message to the mail relay, signed with HMAC-SHA256
//! 4. Mark the row `sent` or `failed` with the relay's answer
//!
//! Sending runs on a background task. Failures are logged and recorded on the
//! outbox row; they never reach the request that triggered the notification.
//! Without `MAIL_RELAY_URL` rows stay `pending`.
//!
//! # Headers Sent
//!
//! - `Content-Type: application/json`
//! - `X-Signature: sha256=<hex>` (only when `MAIL_RELAY_SECRET` is set)
//! - `X-Notification-Id: <uuid>`

use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::{
    app::AppState,
    config::Config,
    db::DbPool,
    error::AppError,
    models::{
        notification::{Email, RelayMessage, Template, TemplateContext},
        user::User,
    },
};

type HmacSha256 = Hmac<Sha256>;

const RELAY_TIMEOUT: Duration = Duration::from_secs(5);

/// Format cents as a dollar amount, e.g. `$1,234.50`.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    let digits = (cents / 100).to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{sign}${grouped}.{:02}", cents % 100)
}

/// Render the subject and body of a template.
pub fn render(template: Template, ctx: &TemplateContext) -> (String, String) {
    let price = ctx
        .estimated_price_cents
        .map(format_cents)
        .unwrap_or_else(|| "n/a".to_string());
    let reference = ctx
        .request_id
        .map(|id| format!("\n\nRequest reference: {id}"))
        .unwrap_or_default();

    let (subject, text) = match template {
        Template::RequestSubmitted => (
            format!("Approval needed: {}", ctx.equipment_name),
            format!(
                "{} requested {} (estimated {}). The request is waiting for your decision.",
                ctx.requester_name, ctx.equipment_name, price
            ),
        ),
        Template::RequestAwaitingAdmin => (
            format!("Admin approval needed: {}", ctx.equipment_name),
            format!(
                "The request of {} for {} (estimated {}) was approved by their team lead \
                 and now needs admin approval.",
                ctx.requester_name, ctx.equipment_name, price
            ),
        ),
        Template::RequestApproved => (
            format!("Request approved: {}", ctx.equipment_name),
            format!(
                "Your request for {} has been approved. You will be notified when it is handed over.",
                ctx.equipment_name
            ),
        ),
        Template::RequestRejected => (
            format!("Request rejected: {}", ctx.equipment_name),
            format!(
                "Your request for {} has been rejected.\n\nReason: {}",
                ctx.equipment_name,
                ctx.reason.as_deref().unwrap_or("not given")
            ),
        ),
        Template::RequestFulfilled => (
            format!("Equipment ready: {}", ctx.equipment_name),
            format!(
                "Your request for {} has been fulfilled and the equipment is now assigned to you.",
                ctx.equipment_name
            ),
        ),
        Template::RequestCancelled => (
            format!("Request withdrawn: {}", ctx.equipment_name),
            format!(
                "{} withdrew their request for {}. No decision is needed anymore.",
                ctx.requester_name, ctx.equipment_name
            ),
        ),
        Template::EquipmentAssigned => (
            format!("Equipment assigned: {}", ctx.equipment_name),
            match ctx.serial_number.as_deref() {
                Some(serial) => format!(
                    "{} (serial {}) is now assigned to you.",
                    ctx.equipment_name, serial
                ),
                None => format!("{} is now assigned to you.", ctx.equipment_name),
            },
        ),
    };

    let body = format!("Hello {},\n\n{}{}", ctx.recipient_name, text, reference);
    (subject, body)
}

/// Generate HMAC-SHA256 signature for a relay payload.
///
/// # Format
///
/// `sha256=<hex_encoded_hmac>`
pub fn sign(secret: &str, payload: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC key length is valid");
    mac.update(payload.as_bytes());
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Outcome of one relay attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// No relay configured
    Skipped,
    Sent { status: u16 },
    Failed { status: Option<u16>, error: String },
}

/// POST one message to the mail relay.
pub async fn deliver(http: &reqwest::Client, config: &Config, message: &RelayMessage) -> Delivery {
    let Some(url) = config.mail_relay_url.as_deref() else {
        return Delivery::Skipped;
    };

    let payload = match serde_json::to_string(message) {
        Ok(payload) => payload,
        Err(e) => {
            return Delivery::Failed {
                status: None,
                error: format!("Failed to serialize message: {e}"),
            };
        }
    };

    let mut request = http
        .post(url)
        .timeout(RELAY_TIMEOUT)
        .header("Content-Type", "application/json")
        .header("X-Notification-Id", message.id.to_string());
    if let Some(secret) = config.mail_relay_secret.as_deref() {
        request = request.header("X-Signature", sign(secret, &payload));
    }

    match request.body(payload).send().await {
        Ok(response) if response.status().is_success() => Delivery::Sent {
            status: response.status().as_u16(),
        },
        Ok(response) => {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Delivery::Failed {
                status: Some(status),
                error: format!("Relay answered {status}: {}", truncate(&body, 500)),
            }
        }
        Err(e) => Delivery::Failed {
            status: None,
            error: format!("Request failed: {e}"),
        },
    }
}

fn truncate(value: &str, max: usize) -> &str {
    match value.char_indices().nth(max) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

/// Write an email to the outbox, try to deliver it and record the result.
pub async fn send(
    pool: &DbPool,
    http: &reqwest::Client,
    config: &Config,
    organization_id: Uuid,
    template: Template,
    email: Email,
) -> Result<Delivery, AppError> {
    let (id, created_at): (Uuid, chrono::DateTime<Utc>) = sqlx::query_as(
        r#"
        INSERT INTO notifications (organization_id, recipient_email, template, subject, body)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, created_at
        "#,
    )
    .bind(organization_id)
    .bind(&email.to)
    .bind(template.as_str())
    .bind(&email.subject)
    .bind(&email.body)
    .fetch_one(pool)
    .await?;

    let message = RelayMessage {
        id,
        from: config.mail_from.clone(),
        to: email.to,
        subject: email.subject,
        body: email.body,
        template: template.as_str().to_string(),
        created_at,
    };

    let delivery = deliver(http, config, &message).await;

    match &delivery {
        Delivery::Skipped => {
            tracing::info!(notification_id = %id, template = template.as_str(), "No mail relay configured, notification left pending");
        }
        Delivery::Sent { status } => {
            sqlx::query(
                "UPDATE notifications SET status = 'sent', response_status = $2, sent_at = NOW() WHERE id = $1",
            )
            .bind(id)
            .bind(i32::from(*status))
            .execute(pool)
            .await?;
            tracing::info!(notification_id = %id, template = template.as_str(), "Notification sent");
        }
        Delivery::Failed { status, error } => {
            sqlx::query(
                "UPDATE notifications SET status = 'failed', response_status = $2, error = $3 WHERE id = $1",
            )
            .bind(id)
            .bind(status.map(i32::from))
            .bind(error)
            .execute(pool)
            .await?;
            tracing::warn!(notification_id = %id, error = %error, "Notification delivery failed");
        }
    }

    Ok(delivery)
}

/// Render `template` for every recipient and send in the background.
///
/// `ctx.recipient_name` is filled in per recipient.
pub fn dispatch(
    state: &AppState,
    organization_id: Uuid,
    recipients: Vec<User>,
    template: Template,
    ctx: TemplateContext,
) {
    if recipients.is_empty() {
        return;
    }

    let state = state.clone();
    tokio::spawn(async move {
        for recipient in recipients {
            let ctx = TemplateContext {
                recipient_name: recipient.name.clone(),
                ..ctx.clone()
            };
            let (subject, body) = render(template, &ctx);
            let email = Email {
                to: recipient.email,
                subject,
                body,
            };

            if let Err(e) = send(
                &state.pool,
                &state.http,
                &state.config,
                organization_id,
                template,
                email,
            )
            .await
            {
                tracing::error!("Failed to record notification {}: {:?}", template.as_str(), e);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, header_exists, method, path},
    };

    fn message() -> RelayMessage {
        RelayMessage {
            id: Uuid::new_v4(),
            from: "inventory@localhost".to_string(),
            to: "ana@example.com".to_string(),
            subject: "Equipment assigned: Laptop".to_string(),
            body: "Hello Ana".to_string(),
            template: "equipment_assigned".to_string(),
            created_at: Utc::now(),
        }
    }

    fn config_with_relay(url: Option<String>, secret: Option<&str>) -> Config {
        let mut config = crate::config::test_config();
        config.mail_relay_url = url;
        config.mail_relay_secret = secret.map(str::to_string);
        config
    }

    #[test]
    fn formats_cents_with_grouping() {
        assert_eq!(format_cents(0), "$0.00");
        assert_eq!(format_cents(5), "$0.05");
        assert_eq!(format_cents(32_900), "$329.00");
        assert_eq!(format_cents(123_456_789), "$1,234,567.89");
        assert_eq!(format_cents(-150), "-$1.50");
    }

    #[test]
    fn rejection_mail_carries_reason() {
        let ctx = TemplateContext {
            recipient_name: "Ana".to_string(),
            equipment_name: "Standing desk".to_string(),
            reason: Some("Budget frozen until Q3".to_string()),
            ..Default::default()
        };

        let (subject, body) = render(Template::RequestRejected, &ctx);

        assert_eq!(subject, "Request rejected: Standing desk");
        assert!(body.starts_with("Hello Ana,"));
        assert!(body.contains("Reason: Budget frozen until Q3"));
    }

    #[test]
    fn approval_mail_mentions_requester_and_price() {
        let request_id = Uuid::new_v4();
        let ctx = TemplateContext {
            recipient_name: "Lead".to_string(),
            requester_name: "Ana".to_string(),
            equipment_name: "Monitor".to_string(),
            estimated_price_cents: Some(32_900),
            request_id: Some(request_id),
            ..Default::default()
        };

        let (_, body) = render(Template::RequestSubmitted, &ctx);

        assert!(body.contains("Ana requested Monitor (estimated $329.00)"));
        assert!(body.ends_with(&request_id.to_string()));
    }

    #[test]
    fn cancellation_mail_tells_approvers_to_stand_down() {
        let ctx = TemplateContext {
            recipient_name: "Lead".to_string(),
            requester_name: "Ana".to_string(),
            equipment_name: "Monitor".to_string(),
            ..Default::default()
        };

        let (subject, body) = render(Template::RequestCancelled, &ctx);

        assert_eq!(subject, "Request withdrawn: Monitor");
        assert!(body.contains("Ana withdrew their request for Monitor"));
    }

    #[test]
    fn signature_matches_known_vector() {
        // HMAC-SHA256("key", "The quick brown fox jumps over the lazy dog")
        assert_eq!(
            sign("key", "The quick brown fox jumps over the lazy dog"),
            "sha256=f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }

    #[tokio::test]
    async fn skips_without_relay() {
        let config = config_with_relay(None, None);
        let delivery = deliver(&reqwest::Client::new(), &config, &message()).await;
        assert_eq!(delivery, Delivery::Skipped);
    }

    #[tokio::test]
    async fn posts_signed_message_to_relay() {
        let server = MockServer::start().await;
        let message = message();
        let payload = serde_json::to_string(&message).unwrap();

        Mock::given(method("POST"))
            .and(path("/send"))
            .and(header("X-Signature", sign("relay-secret", &payload).as_str()))
            .and(header("X-Notification-Id", message.id.to_string().as_str()))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let config = config_with_relay(Some(format!("{}/send", server.uri())), Some("relay-secret"));
        let delivery = deliver(&reqwest::Client::new(), &config, &message).await;

        assert_eq!(delivery, Delivery::Sent { status: 202 });
    }

    #[tokio::test]
    async fn unsigned_when_no_secret() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(header_exists("X-Notification-Id"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let config = config_with_relay(Some(server.uri()), None);
        let delivery = deliver(&reqwest::Client::new(), &config, &message()).await;
        assert_eq!(delivery, Delivery::Sent { status: 200 });

        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].headers.get("X-Signature").is_none());
    }

    #[tokio::test]
    async fn relay_errors_are_reported_as_failures() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down for maintenance"))
            .mount(&server)
            .await;

        let config = config_with_relay(Some(server.uri()), Some("s"));
        let delivery = deliver(&reqwest::Client::new(), &config, &message()).await;

        match delivery {
            Delivery::Failed { status, error } => {
                assert_eq!(status, Some(503));
                assert!(error.contains("down for maintenance"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
