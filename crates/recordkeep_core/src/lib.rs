//! Soft-delete trash and contract-expiry notifications over one SQLite store.
//!
//! Callers trash live records, restore or purge them, and let a retention
//! sweeper clean up what nobody restored. A scanner turns upcoming contract
//! end dates into notifications whose read state survives rescans.

pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod worker;

pub use clock::{ceil_days, Clock, ManualClock, SystemClock, DAY_MS};
pub use config::{ConfigError, EngineConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, init_stderr_logging, logging_status, LogTarget};
pub use model::notification::{
    CandidateAlert, Notification, NotificationFeed, NotificationKind, UNKNOWN_COMPANY,
};
pub use model::snapshot::{EntitySnapshot, EntityType, RecordPayload};
pub use model::trash::{PurgeOutcome, TrashEntry, TrashEntryId, TrashEntrySummary};
pub use repo::notification_repo::{
    NotificationError, NotificationRepository, NotificationResult, ReconcileStats,
    SqliteNotificationRepository,
};
pub use repo::record_repo::{
    RawRecord, RecordError, RecordResult, RecordStore, SqliteRecordStore, StoredRecord,
};
pub use repo::trash_repo::{
    MoveToTrashRequest, SqliteTrashRepository, TrashError, TrashListQuery, TrashRepository,
    TrashResult,
};
pub use service::alert_scanner::AlertScanner;
pub use service::notification_service::NotificationService;
pub use service::sweeper::{RetentionSweeper, SweepReport};
pub use service::trash_service::TrashService;
pub use worker::BackgroundTasks;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
