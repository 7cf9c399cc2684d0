//! Data models representing database entities and API bodies.
//!
//! This module contains all data structures that map to database tables,
//! plus the request/response types built from them.

/// Equipment items, their history and list filters
pub mod equipment;
/// OCR extraction and stored invoices
pub mod invoice;
/// Maintenance log entries
pub mod maintenance;
/// Notification templates and relay messages
pub mod notification;
/// Equipment photo metadata
pub mod photo;
/// Reporting rows
pub mod report;
/// Equipment requests and their approval trail
pub mod request;
/// Recurring costs
pub mod subscription;
/// Teams
pub mod team;
/// Users and roles
pub mod user;
