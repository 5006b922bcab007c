//! Domain model for trashed records and expiry notifications.
//!
//! # Responsibility
//! - Define the data structures shared by repositories and services.
//!
//! # Invariants
//! - Record payloads stay opaque JSON objects.
//! - Trash entries and notifications are identified independently of the
//!   records they describe.

pub mod notification;
pub mod snapshot;
pub mod trash;
