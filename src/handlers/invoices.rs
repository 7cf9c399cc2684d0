//! Invoice HTTP handlers. Admin only.
//!
//! - GET /api/v1/invoices - List processed invoices
//! - POST /api/v1/invoices - Upload a document for OCR
//! - GET /api/v1/invoices/{id} - Get one invoice with its extraction

use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
};
use uuid::Uuid;

use crate::{
    app::AppState,
    error::AppError,
    extract::{AppPath, AppQuery},
    middleware::auth::AuthUser,
    models::invoice::{Invoice, ProcessInvoiceQuery, ProcessInvoiceResponse},
    services::invoice_service,
};

pub async fn list_invoices(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    let invoices = invoice_service::list_invoices(&state.pool, &auth).await?;
    Ok(Json(invoices))
}

/// Run OCR on an invoice document and store the result.
///
/// # Request
///
/// ```text
/// POST /api/v1/invoices?file_name=acme-0042.pdf&materialize=true
/// Content-Type: application/pdf
///
/// <document bytes>
/// ```
///
/// With `materialize=true` equipment and subscription records are created
/// from the line items in the same transaction as the invoice.
///
/// # Response
///
/// - **Success (201 Created)**: `{"invoice": {...}, "equipment_ids": [...], "subscription_ids": [...]}`
/// - **Error (413)**: larger than `MAX_UPLOAD_BYTES`
/// - **Error (415)**: not a PDF, JPEG, PNG or WebP document
/// - **Error (502)**: the OCR model failed or answered garbage
/// - **Error (503)**: OCR is not configured
pub async fn process_invoice(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppQuery(query): AppQuery<ProcessInvoiceQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<ProcessInvoiceResponse>), AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());

    let response =
        invoice_service::process_invoice(&state, &auth, content_type, query, &body).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppPath(invoice_id): AppPath<Uuid>,
) -> Result<Json<Invoice>, AppError> {
    let invoice = invoice_service::get_invoice(&state.pool, &auth, invoice_id).await?;
    Ok(Json(invoice))
}
