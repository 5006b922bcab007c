//! Retention sweep over expired trash entries.
//!
//! # Responsibility
//! - Purge every entry whose retention window has elapsed.
//! - Keep going when single entries fail and report them afterwards.
//!
//! # Invariants
//! - Entries with `now < expires_at` are never purged.
//! - Entries removed concurrently (restore or manual purge) count as
//!   `already_gone`, not as failures.

use crate::clock::Clock;
use crate::model::trash::{PurgeOutcome, TrashEntryId};
use crate::repo::trash_repo::{TrashError, TrashRepository, TrashResult};
use log::{error, info, warn};
use std::time::Instant;

/// Outcome of one sweep cycle.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Expired entries found when the sweep started.
    pub examined: usize,
    pub purged: usize,
    pub already_gone: usize,
    /// Entries that failed to purge; they remain live until the next cycle.
    pub failed: Vec<(TrashEntryId, TrashError)>,
}

impl SweepReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Converts leftover failures into `TrashError::PartialSweepFailure`.
    pub fn into_result(self) -> TrashResult<SweepReport> {
        if self.failed.is_empty() {
            return Ok(self);
        }
        Err(TrashError::PartialSweepFailure {
            failed: self.failed.into_iter().map(|(id, _)| id).collect(),
        })
    }
}

/// Enforces the retention window against a trash repository.
pub struct RetentionSweeper<R: TrashRepository, C: Clock> {
    repo: R,
    clock: C,
}

impl<R: TrashRepository, C: Clock> RetentionSweeper<R, C> {
    pub fn new(repo: R, clock: C) -> Self {
        Self { repo, clock }
    }

    /// Runs one sweep at the current clock time.
    ///
    /// # Errors
    /// - Returns the repository error only when the expired entries cannot be
    ///   listed; per-entry purge failures are collected in the report.
    pub fn sweep_expired(&self) -> TrashResult<SweepReport> {
        let started_at = Instant::now();
        let now_ms = self.clock.now_ms();
        let expired = match self.repo.list_expired_ids(now_ms) {
            Ok(ids) => ids,
            Err(err) => {
                error!(
                    "event=trash_sweep module=sweeper status=error stage=list error={}",
                    err
                );
                return Err(err);
            }
        };

        let mut report = SweepReport {
            examined: expired.len(),
            ..SweepReport::default()
        };
        for id in expired {
            match self.repo.purge_entry(id) {
                Ok(PurgeOutcome::Purged) => report.purged += 1,
                Ok(PurgeOutcome::AlreadyGone) => report.already_gone += 1,
                Err(err) => {
                    warn!(
                        "event=trash_sweep_entry module=sweeper status=error entry_id={} transient={} error={}",
                        id,
                        err.is_transient(),
                        err
                    );
                    report.failed.push((id, err));
                }
            }
        }

        info!(
            "event=trash_sweep module=sweeper status={} duration_ms={} examined={} purged={} already_gone={} failed={}",
            if report.is_complete() { "ok" } else { "partial" },
            started_at.elapsed().as_millis(),
            report.examined,
            report.purged,
            report.already_gone,
            report.failed.len()
        );
        Ok(report)
    }
}
