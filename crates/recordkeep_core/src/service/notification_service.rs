//! Notification use-case service.
//!
//! # Responsibility
//! - Reconcile scan candidates into the durable notification store.
//! - Expose per-reader read state operations and the ordered feed.
//!
//! # Invariants
//! - `reconcile` is the only path that creates or refreshes notification
//!   content.
//! - A reconcile keeps read state for every notification it keeps.

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::model::notification::{CandidateAlert, Notification, NotificationFeed};
use crate::repo::notification_repo::{
    NotificationRepository, NotificationResult, ReconcileStats,
};
use crate::repo::record_repo::RecordStore;
use crate::service::alert_scanner::AlertScanner;
use log::{error, info};
use std::time::Instant;

/// Use-case service wrapper for notification operations.
pub struct NotificationService<R: NotificationRepository, C: Clock> {
    repo: R,
    clock: C,
    source_collection: String,
    retire_stale_on_reconcile: bool,
}

impl<R: NotificationRepository, C: Clock> NotificationService<R, C> {
    pub fn new(repo: R, clock: C, config: &EngineConfig) -> Self {
        Self {
            repo,
            clock,
            source_collection: config.contracts_collection.clone(),
            retire_stale_on_reconcile: config.retire_stale_on_reconcile,
        }
    }

    /// Merges candidates with stored state and returns `reader_id`'s list.
    pub fn reconcile(
        &self,
        candidates: &[CandidateAlert],
        reader_id: &str,
    ) -> NotificationResult<Vec<Notification>> {
        self.apply_candidates(candidates)?;
        self.repo.list(reader_id)
    }

    /// Merges candidates with stored state without reading any feed back.
    pub fn apply_candidates(
        &self,
        candidates: &[CandidateAlert],
    ) -> NotificationResult<ReconcileStats> {
        let started_at = Instant::now();
        let stats = match self.repo.reconcile(
            candidates,
            self.clock.now_ms(),
            &self.source_collection,
            self.retire_stale_on_reconcile,
        ) {
            Ok(stats) => stats,
            Err(err) => {
                error!(
                    "event=notification_reconcile module=notifications status=error candidates={} error={}",
                    candidates.len(),
                    err
                );
                return Err(err);
            }
        };
        info!(
            "event=notification_reconcile module=notifications status=ok duration_ms={} generation={} inserted={} refreshed={} retired={} orphaned={}",
            started_at.elapsed().as_millis(),
            stats.generation,
            stats.inserted,
            stats.refreshed,
            stats.retired,
            stats.orphaned
        );
        Ok(stats)
    }

    /// Runs `scanner` with `lookahead_days` and reconciles the result.
    pub fn scan_and_reconcile<S: RecordStore, SC: Clock>(
        &self,
        scanner: &AlertScanner<S, SC>,
        lookahead_days: u32,
        reader_id: &str,
    ) -> NotificationResult<Vec<Notification>> {
        let candidates = scanner.scan(lookahead_days)?;
        self.reconcile(&candidates, reader_id)
    }

    /// Marks one notification read for `reader_id`. Idempotent.
    ///
    /// # Errors
    /// - `NotificationError::NotFound` for unknown ids.
    pub fn mark_read(&self, reader_id: &str, id: &str) -> NotificationResult<()> {
        self.repo.mark_read(reader_id, id, self.clock.now_ms())?;
        info!(
            "event=notification_read module=notifications status=ok notification_id={}",
            id
        );
        Ok(())
    }

    /// Marks every stored notification read for `reader_id`. Idempotent.
    pub fn mark_all_read(&self, reader_id: &str) -> NotificationResult<usize> {
        let marked = self.repo.mark_all_read(reader_id, self.clock.now_ms())?;
        info!(
            "event=notification_read_all module=notifications status=ok marked={}",
            marked
        );
        Ok(marked)
    }

    pub fn unread_count(&self, reader_id: &str) -> NotificationResult<u64> {
        self.repo.unread_count(reader_id)
    }

    pub fn list(&self, reader_id: &str) -> NotificationResult<Vec<Notification>> {
        self.repo.list(reader_id)
    }

    /// Ordered list plus unread count for `reader_id`.
    pub fn feed(&self, reader_id: &str) -> NotificationResult<NotificationFeed> {
        Ok(NotificationFeed {
            notifications: self.repo.list(reader_id)?,
            unread_count: self.repo.unread_count(reader_id)?,
        })
    }

    /// Deletes notifications absent from the latest reconcile, with their
    /// read state.
    pub fn retire_stale(&self) -> NotificationResult<usize> {
        let retired = self.repo.retire_stale()?;
        info!(
            "event=notification_retire module=notifications status=ok retired={}",
            retired
        );
        Ok(retired)
    }
}
