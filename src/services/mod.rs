//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They handle database transactions, validation, and complex operations.

pub mod auth_service;
pub mod equipment_service;
pub mod invoice_service;
pub mod notification_service;
pub mod ocr_service;
pub mod photo_service;
pub mod report_service;
pub mod request_service;
pub mod subscription_service;
pub mod user_service;
pub mod workflow;
