//! Trash repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Move live records into `trash_entries`, restore them, and purge them.
//! - Keep the record/trash hand-off inside one SQLite transaction.
//!
//! # Invariants
//! - Move-in writes and verifies the trash row before deleting the live row;
//!   any failure rolls back both.
//! - Restore never overwrites a live record with the same id.
//! - Restore and purge remove the trash row with a conditional delete, so of
//!   two racing callers exactly one observes the row.

use crate::db::DbError;
use crate::model::snapshot::{EntitySnapshot, EntityType};
use crate::model::trash::{PurgeOutcome, TrashEntry, TrashEntryId};
use crate::repo::record_repo::{
    delete_row, insert_raw_payload, read_raw_payload, record_exists, RecordError,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use rusqlite::{Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const TRASH_SELECT_SQL: &str = "SELECT
    id,
    entity_type,
    origin_collection,
    record_id,
    payload,
    label,
    deleted_at,
    deleted_by,
    expires_at
FROM trash_entries";

pub type TrashResult<T> = Result<T, TrashError>;

/// Errors from trash persistence and lifecycle operations.
#[derive(Debug)]
pub enum TrashError {
    /// Trash entry does not exist (never created, restored, or purged).
    NotFound(TrashEntryId),
    /// Live record to move does not exist.
    RecordNotFound {
        collection: String,
        record_id: String,
    },
    /// Restore target id is already occupied by a live record.
    Conflict {
        collection: String,
        record_id: String,
    },
    /// Storage failed; the operation had no effect and may be retried.
    StorageUnavailable(DbError),
    /// Some entries could not be purged during a sweep; they stay live.
    PartialSweepFailure { failed: Vec<TrashEntryId> },
    InvalidData(String),
}

impl TrashError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::StorageUnavailable(err) => err.is_transient(),
            Self::PartialSweepFailure { .. } => true,
            _ => false,
        }
    }
}

impl Display for TrashError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "trash entry not found: {id}"),
            Self::RecordNotFound {
                collection,
                record_id,
            } => write!(f, "record `{record_id}` not found in `{collection}`"),
            Self::Conflict {
                collection,
                record_id,
            } => write!(
                f,
                "cannot restore `{record_id}`: a live record already exists in `{collection}`"
            ),
            Self::StorageUnavailable(err) => write!(f, "trash storage unavailable: {err}"),
            Self::PartialSweepFailure { failed } => {
                write!(f, "sweep failed to purge {} trash entries", failed.len())
            }
            Self::InvalidData(message) => write!(f, "invalid persisted trash data: {message}"),
        }
    }
}

impl Error for TrashError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StorageUnavailable(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for TrashError {
    fn from(value: DbError) -> Self {
        Self::StorageUnavailable(value)
    }
}

impl From<rusqlite::Error> for TrashError {
    fn from(value: rusqlite::Error) -> Self {
        Self::StorageUnavailable(DbError::Sqlite(value))
    }
}

impl From<RecordError> for TrashError {
    fn from(value: RecordError) -> Self {
        match value {
            RecordError::Db(err) => Self::StorageUnavailable(err),
            RecordError::Conflict {
                collection,
                record_id,
            } => Self::Conflict {
                collection,
                record_id,
            },
            RecordError::InvalidData(message) => Self::InvalidData(message),
        }
    }
}

/// Input for moving one live record into the trash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveToTrashRequest {
    pub entity_type: EntityType,
    pub origin_collection: String,
    pub record_id: String,
    pub deleted_by: String,
    /// Epoch milliseconds.
    pub deleted_at: i64,
    pub retention_ms: i64,
}

/// Filter and paging options for trash listings.
#[derive(Debug, Clone, Default)]
pub struct TrashListQuery {
    pub entity_type: Option<EntityType>,
    /// Case-insensitive substring of the label or record id.
    pub search_text: Option<String>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for trash lifecycle operations.
pub trait TrashRepository {
    fn move_to_trash(&self, request: &MoveToTrashRequest) -> TrashResult<TrashEntry>;
    fn get_entry(&self, id: TrashEntryId) -> TrashResult<Option<TrashEntry>>;
    /// Reinserts the snapshot and deletes the entry; returns the removed entry.
    fn restore_entry(&self, id: TrashEntryId) -> TrashResult<TrashEntry>;
    fn purge_entry(&self, id: TrashEntryId) -> TrashResult<PurgeOutcome>;
    fn list_entries(&self, query: &TrashListQuery) -> TrashResult<Vec<TrashEntry>>;
    /// Ids of entries with `expires_at <= now_ms`, oldest expiry first.
    fn list_expired_ids(&self, now_ms: i64) -> TrashResult<Vec<TrashEntryId>>;
}

/// SQLite-backed trash repository sharing the database of the record store.
pub struct SqliteTrashRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTrashRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl TrashRepository for SqliteTrashRepository<'_> {
    fn move_to_trash(&self, request: &MoveToTrashRequest) -> TrashResult<TrashEntry> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let raw = read_raw_payload(&tx, &request.origin_collection, &request.record_id)?
            .ok_or_else(|| TrashError::RecordNotFound {
                collection: request.origin_collection.clone(),
                record_id: request.record_id.clone(),
            })?;
        let snapshot = EntitySnapshot::from_raw(
            request.record_id.as_str(),
            request.entity_type.clone(),
            request.origin_collection.as_str(),
            raw,
        )
        .map_err(|err| {
            TrashError::InvalidData(format!(
                "record `{}/{}` is not a JSON object: {err}",
                request.origin_collection, request.record_id
            ))
        })?;
        let entry = TrashEntry::new(
            snapshot,
            request.deleted_by.as_str(),
            request.deleted_at,
            request.retention_ms,
        );

        insert_entry(&tx, &entry)?;
        if !entry_exists(&tx, entry.id)? {
            return Err(TrashError::InvalidData(format!(
                "trash entry {} was not persisted",
                entry.id
            )));
        }
        if !delete_row(&tx, &request.origin_collection, &request.record_id)? {
            return Err(TrashError::RecordNotFound {
                collection: request.origin_collection.clone(),
                record_id: request.record_id.clone(),
            });
        }

        tx.commit()?;
        Ok(entry)
    }

    fn get_entry(&self, id: TrashEntryId) -> TrashResult<Option<TrashEntry>> {
        load_entry(self.conn, id)
    }

    fn restore_entry(&self, id: TrashEntryId) -> TrashResult<TrashEntry> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let entry = load_entry(&tx, id)?.ok_or(TrashError::NotFound(id))?;
        let snapshot = &entry.snapshot;
        if record_exists(&tx, &snapshot.origin_collection, &snapshot.record_id)? {
            return Err(TrashError::Conflict {
                collection: snapshot.origin_collection.clone(),
                record_id: snapshot.record_id.clone(),
            });
        }

        insert_raw_payload(
            &tx,
            &snapshot.origin_collection,
            &snapshot.record_id,
            snapshot.raw_payload(),
        )?;
        if delete_entry(&tx, id)? == 0 {
            return Err(TrashError::NotFound(id));
        }

        tx.commit()?;
        Ok(entry)
    }

    fn purge_entry(&self, id: TrashEntryId) -> TrashResult<PurgeOutcome> {
        if delete_entry(self.conn, id)? == 0 {
            return Ok(PurgeOutcome::AlreadyGone);
        }
        Ok(PurgeOutcome::Purged)
    }

    fn list_entries(&self, query: &TrashListQuery) -> TrashResult<Vec<TrashEntry>> {
        let mut sql = format!("{TRASH_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(entity_type) = &query.entity_type {
            sql.push_str(" AND entity_type = ?");
            bind_values.push(Value::Text(entity_type.as_str().to_string()));
        }

        sql.push_str(" ORDER BY deleted_at DESC, id ASC");

        // SQLite `LIKE` folds ASCII only, so text search and its paging run
        // over parsed rows.
        let needle = query
            .search_text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_lowercase);

        if needle.is_none() {
            if let Some(limit) = query.limit {
                sql.push_str(" LIMIT ?");
                bind_values.push(Value::Integer(i64::from(limit)));
                if query.offset > 0 {
                    sql.push_str(" OFFSET ?");
                    bind_values.push(Value::Integer(i64::from(query.offset)));
                }
            } else if query.offset > 0 {
                sql.push_str(" LIMIT -1 OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_trash_row(row)?);
        }

        let Some(needle) = needle else {
            return Ok(entries);
        };
        let limit = query.limit.map_or(usize::MAX, |limit| limit as usize);
        Ok(entries
            .into_iter()
            .filter(|entry| matches_search(entry, &needle))
            .skip(query.offset as usize)
            .take(limit)
            .collect())
    }

    fn list_expired_ids(&self, now_ms: i64) -> TrashResult<Vec<TrashEntryId>> {
        let mut stmt = self.conn.prepare(
            "SELECT id
             FROM trash_entries
             WHERE expires_at <= ?1
             ORDER BY expires_at ASC, id ASC;",
        )?;
        let mut rows = stmt.query([now_ms])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let id_text: String = row.get(0)?;
            ids.push(parse_entry_id(&id_text)?);
        }
        Ok(ids)
    }
}

fn insert_entry(conn: &Connection, entry: &TrashEntry) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO trash_entries (
            id,
            entity_type,
            origin_collection,
            record_id,
            payload,
            label,
            deleted_at,
            deleted_by,
            expires_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
        params![
            entry.id.to_string(),
            entry.snapshot.entity_type.as_str(),
            entry.snapshot.origin_collection.as_str(),
            entry.snapshot.record_id.as_str(),
            entry.snapshot.raw_payload(),
            entry.label.as_str(),
            entry.deleted_at,
            entry.deleted_by.as_str(),
            entry.expires_at,
        ],
    )?;
    Ok(())
}

fn entry_exists(conn: &Connection, id: TrashEntryId) -> rusqlite::Result<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM trash_entries WHERE id = ?1);",
        [id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn delete_entry(conn: &Connection, id: TrashEntryId) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM trash_entries WHERE id = ?1;", [id.to_string()])
}

fn load_entry(conn: &Connection, id: TrashEntryId) -> TrashResult<Option<TrashEntry>> {
    let mut stmt = conn.prepare(&format!("{TRASH_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_trash_row(row)?));
    }
    Ok(None)
}

fn parse_trash_row(row: &Row<'_>) -> TrashResult<TrashEntry> {
    let id_text: String = row.get("id")?;
    let id = parse_entry_id(&id_text)?;
    let entity_type = EntityType::parse(&row.get::<_, String>("entity_type")?);
    let record_id: String = row.get("record_id")?;
    let origin_collection: String = row.get("origin_collection")?;
    let raw: String = row.get("payload")?;

    let snapshot = EntitySnapshot::from_raw(record_id, entity_type, origin_collection, raw)
        .map_err(|err| {
            TrashError::InvalidData(format!(
                "invalid payload in trash_entries.payload for {id}: {err}"
            ))
        })?;

    Ok(TrashEntry {
        id,
        snapshot,
        label: row.get("label")?,
        deleted_at: row.get("deleted_at")?,
        deleted_by: row.get("deleted_by")?,
        expires_at: row.get("expires_at")?,
    })
}

fn parse_entry_id(value: &str) -> TrashResult<TrashEntryId> {
    Uuid::parse_str(value).map_err(|_| {
        TrashError::InvalidData(format!("invalid uuid value `{value}` in trash_entries.id"))
    })
}

/// `needle` must already be lowercase.
fn matches_search(entry: &TrashEntry, needle: &str) -> bool {
    entry.label.to_lowercase().contains(needle)
        || entry.snapshot.record_id.to_lowercase().contains(needle)
}
