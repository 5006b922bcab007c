//! Trash use-case service.
//!
//! # Responsibility
//! - Entry points for move-to-trash, restore, purge and listing.
//! - Stamp deletions with the clock and the configured retention window.
//!
//! # Invariants
//! - Service APIs never bypass repository transactions.
//! - Purge of a missing entry is reported as `AlreadyGone`, never an error.
//! - Log lines carry ids only, never payload content.

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::model::snapshot::EntityType;
use crate::model::trash::{PurgeOutcome, TrashEntry, TrashEntryId, TrashEntrySummary};
use crate::repo::trash_repo::{
    MoveToTrashRequest, TrashError, TrashListQuery, TrashRepository, TrashResult,
};
use log::{info, warn};

/// Use-case service wrapper for trash lifecycle operations.
pub struct TrashService<R: TrashRepository, C: Clock> {
    repo: R,
    clock: C,
    retention_ms: i64,
    expiring_soon_days: u32,
}

impl<R: TrashRepository, C: Clock> TrashService<R, C> {
    /// Creates a service using retention settings from `config`.
    pub fn new(repo: R, clock: C, config: &EngineConfig) -> Self {
        Self {
            repo,
            clock,
            retention_ms: config.retention_ms(),
            expiring_soon_days: config.expiring_soon_days,
        }
    }

    /// Snapshots the live record and removes it from its collection.
    ///
    /// # Errors
    /// - `TrashError::RecordNotFound` when the record does not exist; nothing
    ///   is written.
    pub fn move_to_trash(
        &self,
        entity_type: EntityType,
        origin_collection: &str,
        record_id: &str,
        actor: &str,
    ) -> TrashResult<TrashEntry> {
        let request = MoveToTrashRequest {
            entity_type,
            origin_collection: origin_collection.to_string(),
            record_id: record_id.to_string(),
            deleted_by: actor.to_string(),
            deleted_at: self.clock.now_ms(),
            retention_ms: self.retention_ms,
        };

        match self.repo.move_to_trash(&request) {
            Ok(entry) => {
                info!(
                    "event=trash_move module=trash status=ok entry_id={} entity_type={} collection={} record_id={} expires_at={}",
                    entry.id,
                    entry.snapshot.entity_type,
                    origin_collection,
                    record_id,
                    entry.expires_at
                );
                Ok(entry)
            }
            Err(err) => {
                warn!(
                    "event=trash_move module=trash status=error collection={} record_id={} error={}",
                    origin_collection, record_id, err
                );
                Err(err)
            }
        }
    }

    /// Reinserts the snapshot into its origin collection and drops the entry.
    ///
    /// # Errors
    /// - `TrashError::NotFound` when the entry is gone.
    /// - `TrashError::Conflict` when the origin id is occupied; the entry is
    ///   left untouched.
    pub fn restore(&self, id: TrashEntryId) -> TrashResult<TrashEntry> {
        match self.repo.restore_entry(id) {
            Ok(entry) => {
                info!(
                    "event=trash_restore module=trash status=ok entry_id={} collection={} record_id={}",
                    id, entry.snapshot.origin_collection, entry.snapshot.record_id
                );
                Ok(entry)
            }
            Err(err) => {
                warn!(
                    "event=trash_restore module=trash status=error entry_id={} error={}",
                    id, err
                );
                Err(err)
            }
        }
    }

    /// Permanently removes an entry. Idempotent.
    pub fn purge(&self, id: TrashEntryId) -> TrashResult<PurgeOutcome> {
        let outcome = self.repo.purge_entry(id)?;
        info!(
            "event=trash_purge module=trash status=ok entry_id={} outcome={:?}",
            id, outcome
        );
        Ok(outcome)
    }

    pub fn get(&self, id: TrashEntryId) -> TrashResult<Option<TrashEntry>> {
        self.repo.get_entry(id)
    }

    /// Like `get`, but a missing entry is `TrashError::NotFound`.
    pub fn require(&self, id: TrashEntryId) -> TrashResult<TrashEntry> {
        self.repo.get_entry(id)?.ok_or(TrashError::NotFound(id))
    }

    /// Lists entries newest deletion first.
    pub fn list(&self, query: &TrashListQuery) -> TrashResult<Vec<TrashEntry>> {
        self.repo.list_entries(query)
    }

    /// Lists entries as payload-free summaries evaluated at the current time.
    pub fn list_summaries(&self, query: &TrashListQuery) -> TrashResult<Vec<TrashEntrySummary>> {
        let now_ms = self.clock.now_ms();
        Ok(self
            .repo
            .list_entries(query)?
            .iter()
            .map(|entry| entry.summarize(now_ms, self.expiring_soon_days))
            .collect())
    }
}
