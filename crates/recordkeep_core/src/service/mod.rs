//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into the trash and notification use cases.
//! - Keep callers decoupled from storage details.

pub mod alert_scanner;
pub mod notification_service;
pub mod sweeper;
pub mod trash_service;
