//! Invoice ingestion: OCR extraction, storage and materialization.
//!
//! # Process
//!
//! 1. Check the document type and size
//! 2. Extract structured data with `ocr_service`
//! 3. In one transaction: store the invoice and, if requested, create one
//!    equipment record per unit of every `equipment` line and one
//!    subscription per `subscription` line
//!
//! The OCR call happens before the transaction is opened so no connection is
//! held while waiting for the model.
//!
//! A serial number that is already registered (or repeats within the invoice)
//! does not fail the upload: the item is created without it and the serial is
//! reported back in `skipped_serial_numbers`.

use std::collections::HashSet;

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    app::AppState,
    db::DbPool,
    error::AppError,
    middleware::auth::AuthUser,
    models::{
        invoice::{
            Invoice, LineItemKind, NormalizedInvoice, ProcessInvoiceQuery, ProcessInvoiceResponse,
        },
        subscription::{BillingCycle, CreateSubscriptionRequest},
    },
    services::{
        equipment_service::{self, NewEquipment},
        ocr_service, photo_service, subscription_service,
    },
};

const DEFAULT_CATEGORY: &str = "uncategorized";

/// Canonical content type of an accepted invoice document.
pub fn document_content_type(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    match essence.to_ascii_lowercase().as_str() {
        "application/pdf" => Some("application/pdf"),
        "image/jpeg" | "image/jpg" => Some("image/jpeg"),
        "image/png" => Some("image/png"),
        "image/webp" => Some("image/webp"),
        _ => None,
    }
}

/// Records to create from an invoice.
#[derive(Debug, Default)]
pub struct Materialization {
    pub equipment: Vec<NewEquipment>,
    pub subscriptions: Vec<CreateSubscriptionRequest>,
}

/// Decide which equipment and subscription records an invoice produces.
///
/// Equipment lines yield `quantity` records (already clamped by the OCR
/// normalization). A serial number is only kept for single-unit lines, since
/// it cannot belong to several items.
pub fn plan_materialization(invoice: &NormalizedInvoice, invoice_id: Uuid) -> Materialization {
    let mut plan = Materialization::default();
    let notes = invoice
        .invoice_number
        .as_deref()
        .map(|number| format!("Imported from invoice {}", number));

    for line in invoice.lines_of(LineItemKind::Equipment) {
        for _ in 0..line.quantity {
            plan.equipment.push(NewEquipment {
                name: line.description.clone(),
                serial_number: if line.quantity == 1 {
                    line.serial_number.clone()
                } else {
                    None
                },
                category: line
                    .category
                    .clone()
                    .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
                purchase_date: invoice.invoice_date,
                purchase_price_cents: line.unit_price_cents.filter(|cents| *cents >= 0),
                notes: notes.clone(),
                invoice_id: Some(invoice_id),
            });
        }
    }

    for line in invoice.lines_of(LineItemKind::Subscription) {
        let cost_cents = line
            .total_cents
            .or_else(|| {
                line.unit_price_cents
                    .map(|unit| unit.saturating_mul(i64::from(line.quantity)))
            })
            .unwrap_or(0)
            .max(0);

        plan.subscriptions.push(CreateSubscriptionRequest {
            name: line.description.clone(),
            vendor: invoice.vendor.clone(),
            cost_cents,
            billing_cycle: BillingCycle::parse_lenient(line.billing_cycle.as_deref()),
            renewal_date: None,
        });
    }

    plan
}

/// Clear serial numbers the organization already has, or that repeat within
/// the plan, and return them.
async fn release_taken_serials(
    conn: &mut PgConnection,
    organization_id: Uuid,
    equipment: &mut [NewEquipment],
) -> Result<Vec<String>, AppError> {
    let mut seen = HashSet::new();
    let mut skipped = Vec::new();

    for item in equipment.iter_mut() {
        let Some(serial) = item.serial_number.clone() else {
            continue;
        };

        let taken = !seen.insert(serial.clone())
            || sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM equipment WHERE organization_id = $1 AND serial_number = $2)",
            )
            .bind(organization_id)
            .bind(&serial)
            .fetch_one(&mut *conn)
            .await?;

        if taken {
            tracing::warn!(serial_number = %serial, "Serial number already registered, importing without it");
            item.serial_number = None;
            skipped.push(serial);
        }
    }

    Ok(skipped)
}

/// Extract, store and optionally materialize an uploaded invoice. Admin only.
///
/// # Errors
///
/// - `UnsupportedMediaType`: not a PDF, JPEG, PNG or WebP document
/// - `PayloadTooLarge`: body exceeds `MAX_UPLOAD_BYTES`
/// - `ServiceUnavailable` / `Upstream`: see `ocr_service`
pub async fn process_invoice(
    state: &AppState,
    user: &AuthUser,
    content_type: Option<&str>,
    query: ProcessInvoiceQuery,
    document: &[u8],
) -> Result<ProcessInvoiceResponse, AppError> {
    user.require_admin()?;

    let raw_content_type = content_type.unwrap_or_default();
    let content_type = document_content_type(raw_content_type).ok_or_else(|| {
        AppError::UnsupportedMediaType(format!(
            "Expected a PDF, JPEG, PNG or WebP document, got '{}'",
            raw_content_type
        ))
    })?;
    photo_service::check_size(document.len(), state.config.max_upload_bytes)?;

    let (extraction, normalized) =
        ocr_service::extract_invoice(&state.http, &state.config, content_type, document).await?;
    let file_name = photo_service::sanitize_file_name(query.file_name.as_deref(), "invoice");

    let mut tx = state.pool.begin().await?;

    let invoice = sqlx::query_as::<_, Invoice>(
        r#"
        INSERT INTO invoices (organization_id, uploaded_by, file_name, content_type, vendor,
                              invoice_number, invoice_date, currency, total_cents, extraction)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(user.organization_id)
    .bind(user.id)
    .bind(&file_name)
    .bind(content_type)
    .bind(&normalized.vendor)
    .bind(&normalized.invoice_number)
    .bind(normalized.invoice_date)
    .bind(&normalized.currency)
    .bind(normalized.total_cents)
    .bind(extraction)
    .fetch_one(&mut *tx)
    .await?;

    let mut equipment_ids = Vec::new();
    let mut subscription_ids = Vec::new();
    let mut skipped_serial_numbers = Vec::new();

    if query.materialize {
        let mut plan = plan_materialization(&normalized, invoice.id);
        skipped_serial_numbers =
            release_taken_serials(&mut tx, user.organization_id, &mut plan.equipment).await?;

        for new in plan.equipment {
            let equipment =
                equipment_service::insert_equipment(&mut tx, user.organization_id, Some(user.id), new)
                    .await?;
            equipment_ids.push(equipment.id);
        }
        for request in plan.subscriptions {
            let subscription = subscription_service::insert_subscription(
                &mut tx,
                user.organization_id,
                Some(invoice.id),
                request,
            )
            .await?;
            subscription_ids.push(subscription.id);
        }
    }

    tx.commit().await?;

    tracing::info!(
        invoice_id = %invoice.id,
        equipment = equipment_ids.len(),
        subscriptions = subscription_ids.len(),
        skipped_serials = skipped_serial_numbers.len(),
        "Invoice processed"
    );

    Ok(ProcessInvoiceResponse {
        invoice,
        equipment_ids,
        subscription_ids,
        skipped_serial_numbers,
    })
}

pub async fn list_invoices(pool: &DbPool, user: &AuthUser) -> Result<Vec<Invoice>, AppError> {
    user.require_admin()?;

    let invoices = sqlx::query_as::<_, Invoice>(
        "SELECT * FROM invoices WHERE organization_id = $1 ORDER BY created_at DESC",
    )
    .bind(user.organization_id)
    .fetch_all(pool)
    .await?;

    Ok(invoices)
}

pub async fn get_invoice(
    pool: &DbPool,
    user: &AuthUser,
    invoice_id: Uuid,
) -> Result<Invoice, AppError> {
    user.require_admin()?;

    sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = $1 AND organization_id = $2")
        .bind(invoice_id)
        .bind(user.organization_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("invoice"))
}
