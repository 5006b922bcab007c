//! Trash entry model.
//!
//! # Responsibility
//! - Own one snapshot together with its retention clock.
//! - Answer liveness questions against a caller-supplied instant.
//!
//! # Invariants
//! - `expires_at = deleted_at + retention window`, fixed at creation.
//! - An entry is live while `now < expires_at` and purgeable otherwise.
//! - Entries are never updated; they are only restored or purged.

use crate::clock::ceil_days;
use crate::model::snapshot::{EntitySnapshot, EntityType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trash entry identifier, unrelated to the snapshot's record id.
pub type TrashEntryId = Uuid;

/// Durable record of one soft-deleted item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrashEntry {
    pub id: TrashEntryId,
    pub snapshot: EntitySnapshot,
    /// Listing label derived from the snapshot at move time.
    pub label: String,
    /// Epoch milliseconds.
    pub deleted_at: i64,
    pub deleted_by: String,
    /// Epoch milliseconds.
    pub expires_at: i64,
}

impl TrashEntry {
    /// Creates a new entry for `snapshot` with a generated id.
    pub fn new(
        snapshot: EntitySnapshot,
        deleted_by: impl Into<String>,
        deleted_at: i64,
        retention_ms: i64,
    ) -> Self {
        let label = snapshot.label();
        Self {
            id: Uuid::new_v4(),
            snapshot,
            label,
            deleted_at,
            deleted_by: deleted_by.into(),
            expires_at: deleted_at.saturating_add(retention_ms),
        }
    }

    pub fn is_live(&self, now_ms: i64) -> bool {
        now_ms < self.expires_at
    }

    pub fn is_purgeable(&self, now_ms: i64) -> bool {
        !self.is_live(now_ms)
    }

    /// Whole days left before the sweeper may purge this entry, never negative.
    pub fn days_until_purge(&self, now_ms: i64) -> i64 {
        ceil_days(now_ms, self.expires_at).map_or(0, |days| days.max(0))
    }

    /// Listing view of this entry as seen at `now_ms`.
    pub fn summarize(&self, now_ms: i64, expiring_soon_days: u32) -> TrashEntrySummary {
        let days_until_purge = self.days_until_purge(now_ms);
        TrashEntrySummary {
            id: self.id,
            entity_type: self.snapshot.entity_type.clone(),
            origin_collection: self.snapshot.origin_collection.clone(),
            record_id: self.snapshot.record_id.clone(),
            label: self.label.clone(),
            deleted_at: self.deleted_at,
            deleted_by: self.deleted_by.clone(),
            expires_at: self.expires_at,
            days_until_purge,
            expiring_soon: days_until_purge <= i64::from(expiring_soon_days),
        }
    }
}

/// Trash listing row without the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrashEntrySummary {
    pub id: TrashEntryId,
    pub entity_type: EntityType,
    pub origin_collection: String,
    pub record_id: String,
    pub label: String,
    pub deleted_at: i64,
    pub deleted_by: String,
    pub expires_at: i64,
    pub days_until_purge: i64,
    pub expiring_soon: bool,
}

/// Result of a purge call; purging a missing entry is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurgeOutcome {
    Purged,
    AlreadyGone,
}
