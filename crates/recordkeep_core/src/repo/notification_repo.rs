//! Notification repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Merge scan candidates into durable notification rows.
//! - Track read state per reader in `notification_reads`.
//!
//! # Invariants
//! - Reconcile never touches read rows of notifications it keeps; only
//!   retiring a notification removes them (via `ON DELETE CASCADE`).
//! - Every reconcile bumps a scan generation; rows not refreshed by the
//!   latest generation are stale.
//! - A stale notification whose source record no longer exists is retired by
//!   the reconcile that notices it, so a reused source id starts unread.
//! - Listing order: `contract_expiring` rows by ascending `days_remaining`,
//!   then other kinds by creation time; ties by id.

use crate::db::DbError;
use crate::model::notification::{CandidateAlert, Notification, NotificationKind};
use crate::repo::record_repo::RecordError;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rusqlite::{Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type NotificationResult<T> = Result<T, NotificationError>;

#[derive(Debug)]
pub enum NotificationError {
    NotFound(String),
    StorageUnavailable(DbError),
    InvalidData(String),
}

impl NotificationError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StorageUnavailable(err) if err.is_transient())
    }
}

impl Display for NotificationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "notification not found: {id}"),
            Self::StorageUnavailable(err) => {
                write!(f, "notification storage unavailable: {err}")
            }
            Self::InvalidData(message) => {
                write!(f, "invalid persisted notification data: {message}")
            }
        }
    }
}

impl Error for NotificationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StorageUnavailable(err) => Some(err),
            Self::NotFound(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for NotificationError {
    fn from(value: DbError) -> Self {
        Self::StorageUnavailable(value)
    }
}

impl From<rusqlite::Error> for NotificationError {
    fn from(value: rusqlite::Error) -> Self {
        Self::StorageUnavailable(DbError::Sqlite(value))
    }
}

impl From<RecordError> for NotificationError {
    fn from(value: RecordError) -> Self {
        match value {
            RecordError::Db(err) => Self::StorageUnavailable(err),
            other => Self::InvalidData(other.to_string()),
        }
    }
}

/// Row counts produced by one reconcile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub generation: i64,
    pub inserted: usize,
    pub refreshed: usize,
    pub retired: usize,
    /// Stale rows retired because their source record was deleted.
    pub orphaned: usize,
}

/// Repository interface for notification state.
pub trait NotificationRepository {
    /// Upserts `candidates` as one scan generation.
    ///
    /// Rows absent from `candidates` whose source record is missing from
    /// `source_collection` are deleted. When `retire_stale` is set, every
    /// row absent from `candidates` is deleted. Both happen in the same
    /// transaction.
    fn reconcile(
        &self,
        candidates: &[CandidateAlert],
        reconciled_at: i64,
        source_collection: &str,
        retire_stale: bool,
    ) -> NotificationResult<ReconcileStats>;
    /// Deletes rows not refreshed by the latest reconcile.
    fn retire_stale(&self) -> NotificationResult<usize>;
    fn mark_read(&self, reader_id: &str, id: &str, read_at: i64) -> NotificationResult<()>;
    /// Marks every stored notification read; returns newly marked rows.
    fn mark_all_read(&self, reader_id: &str, read_at: i64) -> NotificationResult<usize>;
    fn unread_count(&self, reader_id: &str) -> NotificationResult<u64>;
    fn list(&self, reader_id: &str) -> NotificationResult<Vec<Notification>>;
}

/// SQLite-backed notification repository.
pub struct SqliteNotificationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNotificationRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl NotificationRepository for SqliteNotificationRepository<'_> {
    fn reconcile(
        &self,
        candidates: &[CandidateAlert],
        reconciled_at: i64,
        source_collection: &str,
        retire_stale: bool,
    ) -> NotificationResult<ReconcileStats> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let generation = current_generation(&tx)? + 1;
        tx.execute(
            "INSERT INTO notification_scan_state (id, generation, last_reconciled_at)
             VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET
                generation = excluded.generation,
                last_reconciled_at = excluded.last_reconciled_at;",
            params![generation, reconciled_at],
        )?;

        let mut stats = ReconcileStats {
            generation,
            ..ReconcileStats::default()
        };
        for candidate in candidates {
            let id = candidate.notification_id();
            if notification_exists(&tx, &id)? {
                stats.refreshed += 1;
            } else {
                stats.inserted += 1;
            }

            tx.execute(
                "INSERT INTO notifications (
                    id,
                    kind,
                    source_id,
                    title,
                    message,
                    days_remaining,
                    source_snapshot_at,
                    created_at,
                    last_seen_at,
                    seen_generation
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8, ?9)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    message = excluded.message,
                    days_remaining = excluded.days_remaining,
                    source_snapshot_at = excluded.source_snapshot_at,
                    last_seen_at = excluded.last_seen_at,
                    seen_generation = excluded.seen_generation;",
                params![
                    id,
                    candidate.kind.as_str(),
                    candidate.source_id.as_str(),
                    candidate.title(),
                    candidate.message(),
                    candidate.days_remaining,
                    candidate.scanned_at,
                    reconciled_at,
                    generation,
                ],
            )?;
        }

        if retire_stale {
            stats.retired = delete_stale(&tx, generation)?;
        }
        stats.orphaned = delete_orphaned(&tx, generation, source_collection)?;

        tx.commit()?;
        Ok(stats)
    }

    fn retire_stale(&self) -> NotificationResult<usize> {
        let generation = current_generation(self.conn)?;
        Ok(delete_stale(self.conn, generation)?)
    }

    fn mark_read(&self, reader_id: &str, id: &str, read_at: i64) -> NotificationResult<()> {
        if !notification_exists(self.conn, id)? {
            return Err(NotificationError::NotFound(id.to_string()));
        }
        self.conn.execute(
            "INSERT OR IGNORE INTO notification_reads (notification_id, reader_id, read_at)
             VALUES (?1, ?2, ?3);",
            params![id, reader_id, read_at],
        )?;
        Ok(())
    }

    fn mark_all_read(&self, reader_id: &str, read_at: i64) -> NotificationResult<usize> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO notification_reads (notification_id, reader_id, read_at)
             SELECT id, ?1, ?2 FROM notifications;",
            params![reader_id, read_at],
        )?;
        Ok(changed)
    }

    fn unread_count(&self, reader_id: &str) -> NotificationResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM notifications n
             WHERE NOT EXISTS (
                SELECT 1
                FROM notification_reads r
                WHERE r.notification_id = n.id
                  AND r.reader_id = ?1
             );",
            [reader_id],
            |row| row.get(0),
        )?;
        u64::try_from(count)
            .map_err(|_| NotificationError::InvalidData(format!("negative unread count {count}")))
    }

    fn list(&self, reader_id: &str) -> NotificationResult<Vec<Notification>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                n.id,
                n.kind,
                n.source_id,
                n.title,
                n.message,
                n.days_remaining,
                n.source_snapshot_at,
                n.created_at,
                n.last_seen_at,
                n.seen_generation < COALESCE(
                    (SELECT generation FROM notification_scan_state WHERE id = 1),
                    0
                ) AS is_stale,
                EXISTS(
                    SELECT 1
                    FROM notification_reads r
                    WHERE r.notification_id = n.id
                      AND r.reader_id = ?1
                ) AS is_read
             FROM notifications n
             ORDER BY
                CASE n.kind WHEN 'contract_expiring' THEN 0 ELSE 1 END ASC,
                CASE n.kind WHEN 'contract_expiring' THEN n.days_remaining END ASC,
                n.created_at ASC,
                n.id ASC;",
        )?;
        let mut rows = stmt.query([reader_id])?;
        let mut notifications = Vec::new();
        while let Some(row) = rows.next()? {
            notifications.push(parse_notification_row(row)?);
        }
        Ok(notifications)
    }
}

fn current_generation(conn: &Connection) -> rusqlite::Result<i64> {
    let generation: Option<i64> = conn
        .query_row(
            "SELECT generation FROM notification_scan_state WHERE id = 1;",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(generation.unwrap_or(0))
}

fn notification_exists(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM notifications WHERE id = ?1);",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn delete_stale(conn: &Connection, generation: i64) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM notifications WHERE seen_generation < ?1;",
        [generation],
    )
}

fn delete_orphaned(
    conn: &Connection,
    generation: i64,
    source_collection: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM notifications
         WHERE seen_generation < ?1
           AND kind = ?2
           AND NOT EXISTS (
              SELECT 1
              FROM records r
              WHERE r.collection = ?3
                AND r.record_id = notifications.source_id
           );",
        params![
            generation,
            NotificationKind::ContractExpiring.as_str(),
            source_collection
        ],
    )
}

fn parse_notification_row(row: &Row<'_>) -> NotificationResult<Notification> {
    let id: String = row.get("id")?;
    let kind_text: String = row.get("kind")?;
    let kind = NotificationKind::parse(&kind_text).ok_or_else(|| {
        NotificationError::InvalidData(format!(
            "invalid notification kind `{kind_text}` in notifications.kind for {id}"
        ))
    })?;

    Ok(Notification {
        kind,
        source_id: row.get("source_id")?,
        title: row.get("title")?,
        message: row.get("message")?,
        days_remaining: row.get("days_remaining")?,
        source_snapshot_at: row.get("source_snapshot_at")?,
        created_at: row.get("created_at")?,
        last_seen_at: row.get("last_seen_at")?,
        stale: row.get::<_, i64>("is_stale")? != 0,
        read: row.get::<_, i64>("is_read")? != 0,
        id,
    })
}
