//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, raw uploads)
//! 2. Calls the matching service, passing the authenticated user
//! 3. Returns HTTP response (JSON, status code)

/// Login, logout and current user
pub mod auth;

/// Equipment registry, assignment, history and maintenance
pub mod equipment;

/// Health check endpoint
pub mod health;

/// Invoice OCR ingestion
pub mod invoices;

/// Equipment photos
pub mod photos;

/// Dashboard reports
pub mod reports;

/// Equipment requests and the approval workflow
pub mod requests;

/// Recurring subscription costs
pub mod subscriptions;

/// Teams and team leads
pub mod teams;

/// User administration
pub mod users;
