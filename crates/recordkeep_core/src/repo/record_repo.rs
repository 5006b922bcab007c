//! Live record store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Give the engines get/insert/delete/list access to any collection
//!   without knowing its schema.
//!
//! # Invariants
//! - `(collection, record_id)` is unique; inserts never overwrite.
//! - Payload text is stored and returned exactly as written.

use crate::db::DbError;
use crate::model::snapshot::RecordPayload;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RecordResult<T> = Result<T, RecordError>;

#[derive(Debug)]
pub enum RecordError {
    Db(DbError),
    /// A record with the same id already exists in the collection.
    Conflict {
        collection: String,
        record_id: String,
    },
    InvalidData(String),
}

impl RecordError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Db(err) if err.is_transient())
    }
}

impl Display for RecordError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Conflict {
                collection,
                record_id,
            } => write!(f, "record `{record_id}` already exists in `{collection}`"),
            Self::InvalidData(message) => write!(f, "invalid record data: {message}"),
        }
    }
}

impl Error for RecordError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Conflict { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RecordError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RecordError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One live record with its collection coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub collection: String,
    pub record_id: String,
    pub payload: RecordPayload,
}

/// One live record as stored, before its payload is decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub collection: String,
    pub record_id: String,
    pub raw_payload: String,
}

impl RawRecord {
    /// Decodes the payload; `InvalidData` when it is not a JSON object.
    pub fn parse(&self) -> RecordResult<RecordPayload> {
        parse_payload(&self.collection, &self.record_id, &self.raw_payload)
    }
}

/// Record access owned by the form-side collaborators.
pub trait RecordStore {
    fn get_record(&self, collection: &str, record_id: &str) -> RecordResult<Option<RecordPayload>>;
    /// Inserts a record; `Conflict` when the id is taken.
    fn insert_record(
        &self,
        collection: &str,
        record_id: &str,
        payload: &RecordPayload,
    ) -> RecordResult<()>;
    /// Deletes a record; returns whether a row was removed.
    fn delete_record(&self, collection: &str, record_id: &str) -> RecordResult<bool>;
    /// Lists a collection ordered by record id; fails on the first
    /// undecodable payload.
    fn list_records(&self, collection: &str) -> RecordResult<Vec<StoredRecord>>;
    /// Lists a collection ordered by record id without decoding payloads.
    fn list_raw_records(&self, collection: &str) -> RecordResult<Vec<RawRecord>>;
}

/// SQLite-backed record store over the generic `records` table.
pub struct SqliteRecordStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRecordStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl RecordStore for SqliteRecordStore<'_> {
    fn get_record(&self, collection: &str, record_id: &str) -> RecordResult<Option<RecordPayload>> {
        read_raw_payload(self.conn, collection, record_id)?
            .map(|raw| parse_payload(collection, record_id, &raw))
            .transpose()
    }

    fn insert_record(
        &self,
        collection: &str,
        record_id: &str,
        payload: &RecordPayload,
    ) -> RecordResult<()> {
        let raw = serde_json::to_string(payload).map_err(|err| {
            RecordError::InvalidData(format!("cannot encode `{collection}/{record_id}`: {err}"))
        })?;
        if record_exists(self.conn, collection, record_id)? {
            return Err(RecordError::Conflict {
                collection: collection.to_string(),
                record_id: record_id.to_string(),
            });
        }
        insert_raw_payload(self.conn, collection, record_id, &raw)?;
        Ok(())
    }

    fn delete_record(&self, collection: &str, record_id: &str) -> RecordResult<bool> {
        Ok(delete_row(self.conn, collection, record_id)?)
    }

    fn list_records(&self, collection: &str) -> RecordResult<Vec<StoredRecord>> {
        self.list_raw_records(collection)?
            .into_iter()
            .map(|raw| -> RecordResult<StoredRecord> {
                let payload = raw.parse()?;
                Ok(StoredRecord {
                    collection: raw.collection,
                    record_id: raw.record_id,
                    payload,
                })
            })
            .collect()
    }

    fn list_raw_records(&self, collection: &str) -> RecordResult<Vec<RawRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT record_id, payload
             FROM records
             WHERE collection = ?1
             ORDER BY record_id ASC;",
        )?;
        let mut rows = stmt.query([collection])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(RawRecord {
                collection: collection.to_string(),
                record_id: row.get(0)?,
                raw_payload: row.get(1)?,
            });
        }
        Ok(records)
    }
}

fn parse_payload(collection: &str, record_id: &str, raw: &str) -> RecordResult<RecordPayload> {
    serde_json::from_str(raw).map_err(|err| {
        RecordError::InvalidData(format!(
            "payload of `{collection}/{record_id}` is not a JSON object: {err}"
        ))
    })
}

pub(crate) fn read_raw_payload(
    conn: &Connection,
    collection: &str,
    record_id: &str,
) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT payload FROM records WHERE collection = ?1 AND record_id = ?2;",
        params![collection, record_id],
        |row| row.get(0),
    )
    .optional()
}

pub(crate) fn record_exists(
    conn: &Connection,
    collection: &str,
    record_id: &str,
) -> rusqlite::Result<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM records WHERE collection = ?1 AND record_id = ?2
        );",
        params![collection, record_id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn insert_raw_payload(
    conn: &Connection,
    collection: &str,
    record_id: &str,
    raw: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO records (collection, record_id, payload) VALUES (?1, ?2, ?3);",
        params![collection, record_id, raw],
    )?;
    Ok(())
}

pub(crate) fn delete_row(
    conn: &Connection,
    collection: &str,
    record_id: &str,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "DELETE FROM records WHERE collection = ?1 AND record_id = ?2;",
        params![collection, record_id],
    )?;
    Ok(changed > 0)
}
