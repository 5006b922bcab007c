//! Alert candidate and notification models.
//!
//! # Responsibility
//! - Describe transient scan output (`CandidateAlert`).
//! - Describe the persisted, per-reader notification view (`Notification`).
//!
//! # Invariants
//! - Notification ids are derived from kind + source id only, so re-scans
//!   never create duplicates.
//! - Title and message are regenerated from source data on every reconcile.

use serde::{Deserialize, Serialize};

/// Company name used when a contract has no resolvable company.
pub const UNKNOWN_COMPANY: &str = "N/A";

/// Notification category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ContractExpiring,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ContractExpiring => "contract_expiring",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "contract_expiring" => Some(Self::ContractExpiring),
            _ => None,
        }
    }

    /// Prefix of every notification id of this kind.
    fn id_prefix(self) -> &'static str {
        match self {
            Self::ContractExpiring => "contract",
        }
    }

    /// Deterministic notification id for a source record.
    pub fn notification_id(self, source_id: &str) -> String {
        format!("{}_{}", self.id_prefix(), source_id)
    }
}

/// One alert produced by a scan, before reconcile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateAlert {
    pub kind: NotificationKind,
    /// Id of the contract (or other source record) that triggered the alert.
    pub source_id: String,
    pub contract_number: String,
    pub company_name: String,
    /// End instant in epoch milliseconds.
    pub end_at: i64,
    pub days_remaining: i64,
    /// Scan instant `days_remaining` was computed against.
    pub scanned_at: i64,
}

impl CandidateAlert {
    pub fn notification_id(&self) -> String {
        self.kind.notification_id(&self.source_id)
    }

    pub fn title(&self) -> String {
        match self.kind {
            NotificationKind::ContractExpiring => "Contract expiring".to_string(),
        }
    }

    pub fn message(&self) -> String {
        match self.kind {
            NotificationKind::ContractExpiring => {
                let when = match self.days_remaining {
                    0 => "today".to_string(),
                    1 => "in 1 day".to_string(),
                    days => format!("in {days} days"),
                };
                format!(
                    "Contract {} of company {} expires {}",
                    self.contract_number, self.company_name, when
                )
            }
        }
    }
}

/// Persisted notification as seen by one reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub source_id: String,
    pub title: String,
    pub message: String,
    pub days_remaining: Option<i64>,
    pub source_snapshot_at: i64,
    pub created_at: i64,
    pub last_seen_at: i64,
    /// Not part of the most recent reconcile.
    pub stale: bool,
    pub read: bool,
}

/// Ordered notification list plus the reader's unread count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationFeed {
    pub notifications: Vec<Notification>,
    pub unread_count: u64,
}
