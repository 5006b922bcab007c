//! Entity snapshot model.
//!
//! # Responsibility
//! - Capture one live record of any collection as an opaque, type-tagged value.
//!
//! # Invariants
//! - `payload` is a JSON object; the core never looks inside it except to
//!   derive a display label.
//! - `raw_payload` is the exact JSON text read from the live record and is
//!   what gets written back on restore.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};

/// Field/value mapping of a record as owned by its collaborator.
pub type RecordPayload = Map<String, Value>;

/// Payload keys tried, in order, when deriving a listing label.
const LABEL_KEYS: &[&str] = &["name", "title", "contract_number", "process_number", "number"];

/// Semantic tag of a trashed record.
///
/// The closed set covers the record types the admin tool ships with;
/// `Other` carries tags added by the surrounding application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityType {
    Company,
    Contract,
    Process,
    Document,
    Other(String),
}

impl EntityType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Company => "company",
            Self::Contract => "contract",
            Self::Process => "process",
            Self::Document => "document",
            Self::Other(tag) => tag.as_str(),
        }
    }

    /// Parses a tag, normalizing case and surrounding whitespace.
    pub fn parse(value: &str) -> Self {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "company" => Self::Company,
            "contract" => Self::Contract,
            "process" => Self::Process,
            "document" => Self::Document,
            _ => Self::Other(normalized),
        }
    }
}

impl Display for EntityType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for EntityType {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<EntityType> for String {
    fn from(value: EntityType) -> Self {
        value.as_str().to_string()
    }
}

/// Full-field capture of one record at deletion time.
///
/// Serialize-only: the exact stored text is built by [`EntitySnapshot::from_raw`]
/// and is not part of the serialized form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySnapshot {
    /// Id of the original record inside `origin_collection`.
    pub record_id: String,
    pub entity_type: EntityType,
    /// Collection the record is reinserted into on restore.
    pub origin_collection: String,
    pub payload: RecordPayload,
    #[serde(skip)]
    pub(crate) raw_payload: String,
}

impl EntitySnapshot {
    /// Builds a snapshot from the stored JSON text of a live record.
    ///
    /// # Errors
    /// - Returns the JSON error when `raw_payload` is not a JSON object.
    pub fn from_raw(
        record_id: impl Into<String>,
        entity_type: EntityType,
        origin_collection: impl Into<String>,
        raw_payload: impl Into<String>,
    ) -> Result<Self, serde_json::Error> {
        let raw_payload = raw_payload.into();
        let payload: RecordPayload = serde_json::from_str(&raw_payload)?;
        Ok(Self {
            record_id: record_id.into(),
            entity_type,
            origin_collection: origin_collection.into(),
            payload,
            raw_payload,
        })
    }

    /// Exact JSON text captured from the live record.
    pub fn raw_payload(&self) -> &str {
        &self.raw_payload
    }

    /// Human-readable name for listings and search.
    ///
    /// Uses the first non-blank string among a few common naming fields and
    /// falls back to the record id.
    pub fn label(&self) -> String {
        LABEL_KEYS
            .iter()
            .filter_map(|key| self.payload.get(*key))
            .filter_map(Value::as_str)
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map_or_else(|| self.record_id.clone(), str::to_string)
    }
}
