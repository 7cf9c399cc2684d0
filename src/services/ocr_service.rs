//! Invoice OCR through the Gemini `generateContent` API.
//!
//! # Process
//!
//! 1. Base64 encode the document and send it as `inline_data` together with
//!    the extraction prompt, asking for a JSON answer
//! 2. Concatenate the text parts of the first candidate
//! 3. Strip markdown code fences the model sometimes adds anyway
//! 4. Parse as JSON, keep that value verbatim, and read it as an
//!    `ExtractedInvoice` to normalize amounts to cents
//!
//! # Errors
//!
//! - `ServiceUnavailable`: no `GEMINI_API_KEY` configured
//! - `Upstream`: transport failure, non-2xx answer, empty or unparseable output

use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    error::AppError,
    models::invoice::{ExtractedInvoice, InvoiceLine, NormalizedInvoice},
};

const OCR_TIMEOUT: Duration = Duration::from_secs(60);

/// Units created per equipment line are capped to keep a misread quantity
/// from flooding the registry.
pub const MAX_UNITS_PER_LINE: u32 = 50;

const PROMPT: &str = r#"You extract structured data from purchase invoices.
Answer with a single JSON object and nothing else, using exactly these keys:
{
  "vendor": string or null,
  "invoice_number": string or null,
  "invoice_date": "YYYY-MM-DD" or null,
  "currency": ISO 4217 code or null,
  "total": number or null,
  "line_items": [
    {
      "description": string,
      "quantity": number,
      "unit_price": number or null,
      "total": number or null,
      "kind": "equipment" | "subscription" | "other",
      "category": short lowercase category such as "laptop", "monitor", "software", or null,
      "serial_number": string or null,
      "billing_cycle": "monthly" | "yearly" | null
    }
  ]
}
Use "equipment" for physical hardware, "subscription" for recurring software or
services, and "other" for shipping, taxes, discounts and anything else.
Amounts are plain numbers in the invoice currency without symbols."#;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
    temperature: f32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CandidateContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResponsePart {
    text: Option<String>,
}

/// Send a document to the model and return its raw JSON answer and the
/// normalized extraction.
pub async fn extract_invoice(
    http: &reqwest::Client,
    config: &Config,
    content_type: &str,
    document: &[u8],
) -> Result<(serde_json::Value, NormalizedInvoice), AppError> {
    let api_key = config
        .gemini_api_key
        .as_deref()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| AppError::ServiceUnavailable("Invoice OCR is not configured".to_string()))?;

    let url = format!(
        "{}/v1beta/models/{}:generateContent",
        config.gemini_base_url.trim_end_matches('/'),
        config.gemini_model
    );

    let body = GenerateRequest {
        contents: vec![Content {
            parts: vec![
                RequestPart::Text { text: PROMPT },
                RequestPart::InlineData {
                    inline_data: InlineData {
                        mime_type: content_type,
                        data: STANDARD.encode(document),
                    },
                },
            ],
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json",
            temperature: 0.0,
        },
    };

    let response = http
        .post(&url)
        .timeout(OCR_TIMEOUT)
        .header("x-goog-api-key", api_key)
        .json(&body)
        .send()
        .await
        .map_err(|e| AppError::Upstream(format!("OCR request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        tracing::warn!(status = status.as_u16(), "OCR model returned an error: {}", text);
        return Err(AppError::Upstream(format!(
            "OCR model answered with status {}",
            status.as_u16()
        )));
    }

    let answer: GenerateResponse = response
        .json()
        .await
        .map_err(|e| AppError::Upstream(format!("Unreadable OCR response: {}", e)))?;

    let text = answer
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| AppError::Upstream("OCR model returned no text".to_string()))?;

    let (raw, extracted) = parse_extraction(&text)?;
    let normalized = normalize(&extracted);

    tracing::info!(
        lines = normalized.lines.len(),
        vendor = normalized.vendor.as_deref().unwrap_or("-"),
        "Invoice extracted"
    );

    Ok((raw, normalized))
}

/// Remove a surrounding markdown code fence (with optional language tag).
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the language tag line, e.g. "json"
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse the model's answer into its JSON value and the typed view of it.
pub fn parse_extraction(text: &str) -> Result<(serde_json::Value, ExtractedInvoice), AppError> {
    let raw: serde_json::Value =
        serde_json::from_str(strip_code_fences(text)).map_err(invalid_extraction)?;
    let extracted = ExtractedInvoice::deserialize(&raw).map_err(invalid_extraction)?;
    Ok((raw, extracted))
}

fn invalid_extraction(e: serde_json::Error) -> AppError {
    tracing::warn!("OCR output is not valid invoice JSON: {}", e);
    AppError::Upstream(format!("OCR output is not valid invoice JSON: {}", e))
}

/// Convert a decimal amount to cents, rounding half away from zero.
pub fn to_cents(amount: f64) -> Option<i64> {
    let cents = (amount * 100.0).round();
    (cents.is_finite() && cents.abs() < i64::MAX as f64).then_some(cents as i64)
}

/// Parse the date formats invoices commonly use. Unknown formats give `None`.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    const FORMATS: &[&str] = &[
        "%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y", "%m/%d/%Y", "%d/%m/%Y", "%B %d, %Y", "%b %d, %Y",
        "%d %B %Y", "%d %b %Y",
    ];

    let value = value.trim();
    // Datetimes such as "2025-03-14T00:00:00Z"
    let value = value.split('T').next().unwrap_or(value);
    FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Clamp a model quantity to a whole number of units in `1..=MAX_UNITS_PER_LINE`.
pub fn clamp_quantity(quantity: Option<f64>) -> u32 {
    match quantity {
        Some(q) if q.is_finite() && q >= 1.0 => (q.round() as u32).clamp(1, MAX_UNITS_PER_LINE),
        _ => 1,
    }
}

/// Turn the raw extraction into cents, whole quantities and clean strings.
pub fn normalize(extracted: &ExtractedInvoice) -> NormalizedInvoice {
    let lines = extracted
        .line_items
        .iter()
        .flatten()
        .map(|item| {
            let quantity = clamp_quantity(item.quantity);
            let total_cents = item.total.and_then(to_cents);
            let unit_price_cents = item
                .unit_price
                .and_then(to_cents)
                .or_else(|| total_cents.map(|total| (total as f64 / quantity as f64).round() as i64));

            InvoiceLine {
                description: clean(&item.description).unwrap_or_else(|| "Unnamed item".to_string()),
                quantity,
                unit_price_cents,
                total_cents,
                kind: item.kind.unwrap_or_default(),
                category: clean(&item.category).map(|c| c.to_lowercase()),
                serial_number: clean(&item.serial_number),
                billing_cycle: clean(&item.billing_cycle),
            }
        })
        .collect();

    NormalizedInvoice {
        vendor: clean(&extracted.vendor),
        invoice_number: clean(&extracted.invoice_number),
        invoice_date: extracted.invoice_date.as_deref().and_then(parse_date),
        currency: clean(&extracted.currency).map(|c| c.to_uppercase()),
        total_cents: extracted.total.and_then(to_cents),
        lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::invoice::LineItemKind;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, header, method, path},
    };

    const SAMPLE: &str = r#"{
        "vendor": " ACME Hardware ",
        "invoice_number": "INV-42",
        "invoice_date": "14.03.2025",
        "currency": "eur",
        "total": 2399.0,
        "line_items": [
            {"description": "Dell U2723QE", "quantity": 2, "unit_price": 599.5, "total": 1199.0,
             "kind": "equipment", "category": "Monitor"},
            {"description": "Figma seats", "quantity": 1, "total": 1200.0,
             "kind": "subscription", "billing_cycle": "yearly"},
            {"description": "Shipping", "total": 0.0, "kind": "freight"}
        ]
    }"#;

    fn config(base_url: String, key: Option<&str>) -> Config {
        let mut config = crate::config::test_config();
        config.gemini_base_url = base_url;
        config.gemini_api_key = key.map(str::to_string);
        config
    }

    fn model_answer(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": text}], "role": "model"}}]
        })
    }

    #[test]
    fn strips_fences_with_and_without_language() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```\n"), "{}");
        assert_eq!(strip_code_fences("  {\"plain\":true} "), "{\"plain\":true}");
    }

    #[test]
    fn amounts_round_to_cents() {
        assert_eq!(to_cents(599.5), Some(59_950));
        assert_eq!(to_cents(0.125), Some(13));
        assert_eq!(to_cents(19.99), Some(1_999));
        assert_eq!(to_cents(f64::NAN), None);
        assert_eq!(to_cents(f64::INFINITY), None);
    }

    #[test]
    fn dates_in_common_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 14);
        for value in [
            "2025-03-14",
            "14.03.2025",
            "03/14/2025",
            "March 14, 2025",
            "14 Mar 2025",
            "2025-03-14T10:00:00Z",
        ] {
            assert_eq!(parse_date(value), expected, "{value}");
        }
        assert_eq!(parse_date("sometime in spring"), None);
    }

    #[test]
    fn quantities_are_clamped() {
        assert_eq!(clamp_quantity(None), 1);
        assert_eq!(clamp_quantity(Some(0.0)), 1);
        assert_eq!(clamp_quantity(Some(-3.0)), 1);
        assert_eq!(clamp_quantity(Some(2.4)), 2);
        assert_eq!(clamp_quantity(Some(1_000.0)), MAX_UNITS_PER_LINE);
        assert_eq!(clamp_quantity(Some(f64::NAN)), 1);
    }

    #[test]
    fn normalizes_sample_invoice() {
        let (_, extracted) = parse_extraction(SAMPLE).unwrap();
        let normalized = normalize(&extracted);

        assert_eq!(normalized.vendor.as_deref(), Some("ACME Hardware"));
        assert_eq!(normalized.currency.as_deref(), Some("EUR"));
        assert_eq!(normalized.invoice_date, NaiveDate::from_ymd_opt(2025, 3, 14));
        assert_eq!(normalized.total_cents, Some(239_900));
        assert_eq!(normalized.lines.len(), 3);

        let monitor = &normalized.lines[0];
        assert_eq!(monitor.quantity, 2);
        assert_eq!(monitor.unit_price_cents, Some(59_950));
        assert_eq!(monitor.category.as_deref(), Some("monitor"));

        // Unit price derived from total
        assert_eq!(normalized.lines[1].unit_price_cents, Some(120_000));
        // Unknown kinds fall back to other
        assert_eq!(normalized.lines[2].kind, LineItemKind::Other);
        assert_eq!(normalized.lines_of(LineItemKind::Equipment).count(), 1);
    }

    #[test]
    fn explicit_nulls_and_missing_fields_are_tolerated() {
        let (_, extracted) = parse_extraction(r#"{"vendor": null, "line_items": null}"#).unwrap();
        let normalized = normalize(&extracted);

        assert_eq!(normalized.vendor, None);
        assert!(normalized.lines.is_empty());
    }

    #[test]
    fn garbage_is_an_upstream_error() {
        assert!(matches!(
            parse_extraction("I could not read this invoice."),
            Err(AppError::Upstream(_))
        ));
        // Valid JSON, but not an invoice object
        assert!(matches!(
            parse_extraction("[1, 2, 3]"),
            Err(AppError::Upstream(_))
        ));
    }

    #[test]
    fn raw_answer_keeps_keys_outside_the_prompt() {
        let (raw, extracted) = parse_extraction(
            r#"{"vendor": "ACME", "tax_id": "DE123", "line_items": [{"description": "Dock", "warranty": "3y"}]}"#,
        )
        .unwrap();

        assert_eq!(raw["tax_id"], "DE123");
        assert_eq!(raw["line_items"][0]["warranty"], "3y");
        assert_eq!(extracted.vendor.as_deref(), Some("ACME"));
    }

    #[tokio::test]
    async fn missing_key_is_unavailable() {
        let config = config("http://127.0.0.1:9".to_string(), None);
        let result = extract_invoice(&reqwest::Client::new(), &config, "application/pdf", b"%PDF").await;
        assert!(matches!(result, Err(AppError::ServiceUnavailable(_))));
    }

    #[tokio::test]
    async fn sends_document_and_parses_fenced_answer() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "generationConfig": {"responseMimeType": "application/json"}
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(model_answer(&format!("```json\n{}\n```", SAMPLE))),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = config(server.uri(), Some("test-key"));
        let (raw, normalized) = extract_invoice(&reqwest::Client::new(), &config, "image/png", b"png")
            .await
            .unwrap();

        assert_eq!(raw["invoice_number"], "INV-42");
        assert_eq!(normalized.lines_of(LineItemKind::Subscription).count(), 1);

        let requests = server.received_requests().await.unwrap();
        let sent: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let parts = &sent["contents"][0]["parts"];
        assert!(parts[0]["text"].as_str().unwrap().contains("line_items"));
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[1]["inline_data"]["data"], "cG5n");
    }

    #[tokio::test]
    async fn model_errors_are_upstream_errors() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let config = config(server.uri(), Some("test-key"));
        let result = extract_invoice(&reqwest::Client::new(), &config, "application/pdf", b"%PDF").await;
        assert!(matches!(result, Err(AppError::Upstream(_))));
    }

    #[tokio::test]
    async fn empty_candidates_are_upstream_errors() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"candidates": []})))
            .mount(&server)
            .await;

        let config = config(server.uri(), Some("test-key"));
        let result = extract_invoice(&reqwest::Client::new(), &config, "application/pdf", b"%PDF").await;
        assert!(matches!(result, Err(AppError::Upstream(_))));
    }
}
