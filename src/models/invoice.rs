//! Invoice models: stored invoices and the structured data extracted by OCR.
//!
//! # Extraction format
//!
//! The OCR model is asked to answer with exactly this JSON shape:
//!
//! ```json
//! {
//!   "vendor": "ACME Hardware GmbH",
//!   "invoice_number": "INV-2025-0042",
//!   "invoice_date": "2025-03-14",
//!   "currency": "EUR",
//!   "total": 2399.00,
//!   "line_items": [
//!     {
//!       "description": "Dell U2723QE monitor",
//!       "quantity": 2,
//!       "unit_price": 599.50,
//!       "total": 1199.00,
//!       "kind": "equipment",
//!       "category": "monitor",
//!       "serial_number": null,
//!       "billing_cycle": null
//!     }
//!   ]
//! }
//! ```
//!
//! Every field is optional on the way in: models omit what they cannot read.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maps to the `invoices` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Invoice {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub organization_id: Uuid,
    pub uploaded_by: Option<Uuid>,
    pub file_name: String,
    pub content_type: String,
    pub vendor: Option<String>,
    pub invoice_number: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub currency: Option<String>,
    pub total_cents: Option<i64>,

    /// The model's JSON answer, verbatim (keys outside the prompt included)
    pub extraction: serde_json::Value,

    pub created_at: DateTime<Utc>,
}

/// What a line item represents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItemKind {
    Equipment,
    Subscription,
    #[default]
    #[serde(other)]
    Other,
}

/// Raw line item as produced by the model.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtractedLineItem {
    pub description: Option<String>,
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
    pub total: Option<f64>,
    pub kind: Option<LineItemKind>,
    pub category: Option<String>,
    pub serial_number: Option<String>,
    pub billing_cycle: Option<String>,
}

/// Typed view of the model's answer. The answer itself is stored verbatim.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtractedInvoice {
    pub vendor: Option<String>,
    pub invoice_number: Option<String>,
    pub invoice_date: Option<String>,
    pub currency: Option<String>,
    pub total: Option<f64>,
    pub line_items: Option<Vec<ExtractedLineItem>>,
}

/// Line item after amounts are converted to cents and text is cleaned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceLine {
    pub description: String,
    pub quantity: u32,
    pub unit_price_cents: Option<i64>,
    pub total_cents: Option<i64>,
    pub kind: LineItemKind,
    pub category: Option<String>,
    pub serial_number: Option<String>,
    pub billing_cycle: Option<String>,
}

/// Invoice after normalization, ready to be stored and materialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedInvoice {
    pub vendor: Option<String>,
    pub invoice_number: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub currency: Option<String>,
    pub total_cents: Option<i64>,
    pub lines: Vec<InvoiceLine>,
}

impl NormalizedInvoice {
    pub fn lines_of(&self, kind: LineItemKind) -> impl Iterator<Item = &InvoiceLine> {
        self.lines.iter().filter(move |line| line.kind == kind)
    }
}

/// Query string of `POST /api/v1/invoices`.
#[derive(Debug, Default, Deserialize)]
pub struct ProcessInvoiceQuery {
    pub file_name: Option<String>,

    /// Create equipment and subscription records from the line items
    #[serde(default)]
    pub materialize: bool,
}

/// Response of `POST /api/v1/invoices`.
#[derive(Debug, Serialize)]
pub struct ProcessInvoiceResponse {
    pub invoice: Invoice,
    pub equipment_ids: Vec<Uuid>,
    pub subscription_ids: Vec<Uuid>,

    /// Serial numbers already registered in the organization; the matching
    /// items were created without one
    pub skipped_serial_numbers: Vec<String>,
}
