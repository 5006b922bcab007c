//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define data access contracts for live records, trash entries and
//!   notifications.
//! - Keep SQLite query details out of the service layer.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to storage errors.
//! - Multi-step mutations run inside one `IMMEDIATE` transaction.

pub mod notification_repo;
pub mod record_repo;
pub mod trash_repo;
