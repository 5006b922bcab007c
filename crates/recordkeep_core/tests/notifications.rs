use recordkeep_core::db::open_db_in_memory;
use recordkeep_core::{
    AlertScanner, EngineConfig, ManualClock, NotificationError, NotificationKind,
    NotificationService, RecordPayload, RecordStore, SqliteNotificationRepository,
    SqliteRecordStore, DAY_MS,
};
use rusqlite::Connection;
use serde_json::{json, Value};

/// 2024-01-01T00:00:00Z
const NOW: i64 = 1_704_067_200_000;
const READER: &str = "reader-1";

fn payload(value: Value) -> RecordPayload {
    value.as_object().unwrap().clone()
}

fn seed(conn: &Connection, collection: &str, record_id: &str, value: Value) {
    SqliteRecordStore::new(conn)
        .insert_record(collection, record_id, &payload(value))
        .unwrap();
}

fn contract(end_date: &str) -> Value {
    json!({
        "status": "active",
        "end_date": end_date,
        "contract_number": "042/2024",
        "company_id": "co-1",
    })
}

fn scanner<'conn>(
    conn: &'conn Connection,
    clock: &ManualClock,
    config: &EngineConfig,
) -> AlertScanner<SqliteRecordStore<'conn>, ManualClock> {
    AlertScanner::new(SqliteRecordStore::new(conn), clock.clone(), config.clone())
}

fn notifications<'conn>(
    conn: &'conn Connection,
    clock: &ManualClock,
    config: &EngineConfig,
) -> NotificationService<SqliteNotificationRepository<'conn>, ManualClock> {
    NotificationService::new(SqliteNotificationRepository::new(conn), clock.clone(), config)
}

#[test]
fn contract_ten_days_out_alerts_and_keeps_read_state_across_rescans() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(NOW);
    let config = EngineConfig::default();
    seed(&conn, "companies", "co-1", json!({"name": "Acme"}));
    seed(&conn, "contracts", "C-100", contract("2024-01-11"));

    let scanner = scanner(&conn, &clock, &config);
    let candidates = scanner.scan(120).unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].source_id, "C-100");
    assert_eq!(candidates[0].days_remaining, 10);

    let service = notifications(&conn, &clock, &config);
    let listed = service.reconcile(&candidates, READER).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, "contract_C-100");
    assert_eq!(listed[0].kind, NotificationKind::ContractExpiring);
    assert_eq!(listed[0].days_remaining, Some(10));
    assert_eq!(
        listed[0].message,
        "Contract 042/2024 of company Acme expires in 10 days"
    );
    assert!(!listed[0].read);
    assert!(!listed[0].stale);
    assert_eq!(service.unread_count(READER).unwrap(), 1);

    service.mark_read(READER, "contract_C-100").unwrap();
    let listed = service
        .scan_and_reconcile(&scanner, 120, READER)
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].read);
    assert_eq!(service.unread_count(READER).unwrap(), 0);
}

#[test]
fn rescans_of_unchanged_data_are_identical() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(NOW);
    let config = EngineConfig::default();
    seed(&conn, "contracts", "C-2", contract("2024-02-01"));
    seed(&conn, "contracts", "C-1", contract("2024-01-05"));
    seed(&conn, "contracts", "C-3", contract("2024-01-05"));

    let scanner = scanner(&conn, &clock, &config);
    let first = scanner.scan(120).unwrap();
    let second = scanner.scan(120).unwrap();
    assert_eq!(first, second);

    let ids: Vec<&str> = first.iter().map(|c| c.source_id.as_str()).collect();
    assert_eq!(ids, vec!["C-1", "C-3", "C-2"]);

    let service = notifications(&conn, &clock, &config);
    let once = service.reconcile(&first, READER).unwrap();
    let twice = service.reconcile(&second, READER).unwrap();
    let once_ids: Vec<&str> = once.iter().map(|n| n.id.as_str()).collect();
    let twice_ids: Vec<&str> = twice.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(once_ids, twice_ids);
    assert_eq!(twice.len(), 3);
}

#[test]
fn scan_window_is_inclusive_and_skips_inactive_or_lapsed_contracts() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(NOW);
    let config = EngineConfig::default();
    seed(&conn, "contracts", "today", contract("2024-01-01"));
    seed(&conn, "contracts", "edge", contract("2024-04-30"));
    seed(&conn, "contracts", "beyond", contract("2024-05-01"));
    seed(&conn, "contracts", "lapsed", contract("2023-12-30"));
    seed(
        &conn,
        "contracts",
        "closed",
        json!({"status": "terminated", "end_date": "2024-01-03"}),
    );
    seed(
        &conn,
        "contracts",
        "shouting",
        json!({"status": " ACTIVE ", "end_date": "2024-01-03"}),
    );
    seed(&conn, "contracts", "undated", json!({"status": "active"}));
    seed(
        &conn,
        "contracts",
        "garbled",
        json!({"status": "active", "end_date": "soon"}),
    );

    let candidates = scanner(&conn, &clock, &config).scan(120).unwrap();
    let found: Vec<(&str, i64)> = candidates
        .iter()
        .map(|c| (c.source_id.as_str(), c.days_remaining))
        .collect();

    assert_eq!(found, vec![("today", 0), ("shouting", 2), ("edge", 120)]);
    assert!(candidates[0].message().ends_with("expires today"));
}

#[test]
fn configured_active_statuses_are_honored() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(NOW);
    let config = EngineConfig::from_toml_str(r#"active_statuses = ["active", "Vigente"]"#).unwrap();
    seed(
        &conn,
        "contracts",
        "C-7",
        json!({"status": "vigente", "end_date": "2024-01-08"}),
    );

    let candidates = scanner(&conn, &clock, &config).scan(30).unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].days_remaining, 7);
}

#[test]
fn missing_company_and_contract_number_fall_back() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(NOW);
    let config = EngineConfig::default();
    seed(
        &conn,
        "contracts",
        "C-9",
        json!({"status": "active", "end_date": "2024-01-02", "company_id": "co-gone"}),
    );

    let candidates = scanner(&conn, &clock, &config).scan(120).unwrap();
    assert_eq!(
        candidates[0].message(),
        "Contract C-9 of company N/A expires in 1 day"
    );
}

#[test]
fn read_state_is_tracked_per_reader() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(NOW);
    let config = EngineConfig::default();
    seed(&conn, "contracts", "C-1", contract("2024-01-05"));
    seed(&conn, "contracts", "C-2", contract("2024-01-06"));

    let candidates = scanner(&conn, &clock, &config).scan(120).unwrap();
    let service = notifications(&conn, &clock, &config);
    service.reconcile(&candidates, READER).unwrap();

    service.mark_read("alice", "contract_C-1").unwrap();
    service.mark_read("alice", "contract_C-1").unwrap();

    assert_eq!(service.unread_count("alice").unwrap(), 1);
    assert_eq!(service.unread_count("bob").unwrap(), 2);

    assert_eq!(service.mark_all_read("bob").unwrap(), 2);
    assert_eq!(service.mark_all_read("bob").unwrap(), 0);
    assert_eq!(service.unread_count("bob").unwrap(), 0);

    let feed = service.feed("alice").unwrap();
    assert_eq!(feed.unread_count, 1);
    let read: Vec<bool> = feed.notifications.iter().map(|n| n.read).collect();
    assert_eq!(read, vec![true, false]);
}

#[test]
fn mark_read_of_unknown_notification_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(NOW);
    let service = notifications(&conn, &clock, &EngineConfig::default());

    let err = service.mark_read(READER, "contract_nope").unwrap_err();
    assert!(matches!(err, NotificationError::NotFound(ref id) if id == "contract_nope"));
    assert_eq!(service.mark_all_read(READER).unwrap(), 0);
}

#[test]
fn rescan_refreshes_countdown_without_resetting_read() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(NOW);
    let config = EngineConfig::default();
    seed(&conn, "contracts", "C-100", contract("2024-01-11"));

    let scanner = scanner(&conn, &clock, &config);
    let service = notifications(&conn, &clock, &config);
    service.scan_and_reconcile(&scanner, 120, READER).unwrap();
    service.mark_read(READER, "contract_C-100").unwrap();

    clock.advance_days(3);
    let listed = service.scan_and_reconcile(&scanner, 120, READER).unwrap();

    assert_eq!(listed[0].days_remaining, Some(7));
    assert!(listed[0].message.ends_with("in 7 days"));
    assert_eq!(listed[0].created_at, NOW);
    assert_eq!(listed[0].last_seen_at, NOW + 3 * DAY_MS);
    assert!(listed[0].read);
}

#[test]
fn vanished_alerts_go_stale_until_retired() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(NOW);
    let config = EngineConfig::default();
    seed(&conn, "contracts", "C-100", contract("2024-01-11"));

    let scanner = scanner(&conn, &clock, &config);
    let service = notifications(&conn, &clock, &config);
    service.scan_and_reconcile(&scanner, 120, READER).unwrap();
    service.mark_read(READER, "contract_C-100").unwrap();

    let listed = service.reconcile(&[], READER).unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].stale);
    assert!(listed[0].read);

    assert_eq!(service.retire_stale().unwrap(), 1);
    assert!(service.list(READER).unwrap().is_empty());
    assert_eq!(service.retire_stale().unwrap(), 0);

    let listed = service.scan_and_reconcile(&scanner, 120, READER).unwrap();
    assert_eq!(listed.len(), 1);
    assert!(!listed[0].read);
    assert!(!listed[0].stale);
}

#[test]
fn retire_on_reconcile_drops_vanished_alerts_immediately() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(NOW);
    let config = EngineConfig::from_toml_str("retire_stale_on_reconcile = true").unwrap();
    seed(&conn, "contracts", "C-1", contract("2024-01-05"));
    seed(&conn, "contracts", "C-2", contract("2024-01-06"));

    let scanner = scanner(&conn, &clock, &config);
    let service = notifications(&conn, &clock, &config);
    assert_eq!(service.scan_and_reconcile(&scanner, 120, READER).unwrap().len(), 2);

    let store = SqliteRecordStore::new(&conn);
    assert!(store.delete_record("contracts", "C-1").unwrap());

    let stats = service
        .apply_candidates(&scanner.scan(120).unwrap())
        .unwrap();
    assert_eq!(stats.refreshed, 1);
    assert_eq!(stats.retired, 1);

    let ids: Vec<String> = service
        .list(READER)
        .unwrap()
        .into_iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(ids, vec!["contract_C-2".to_string()]);
}

#[test]
fn list_orders_by_days_remaining_then_id() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(NOW);
    let config = EngineConfig::default();
    seed(&conn, "contracts", "C-b", contract("2024-01-06"));
    seed(&conn, "contracts", "C-far", contract("2024-03-01"));
    seed(&conn, "contracts", "C-a", contract("2024-01-06"));
    seed(&conn, "contracts", "C-near", contract("2024-01-02"));

    let scanner = scanner(&conn, &clock, &config);
    let listed = notifications(&conn, &clock, &config)
        .scan_and_reconcile(&scanner, 120, READER)
        .unwrap();

    let ids: Vec<&str> = listed.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["contract_C-near", "contract_C-a", "contract_C-b", "contract_C-far"]
    );
}

#[test]
fn reused_contract_id_after_deletion_starts_unread() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(NOW);
    let config = EngineConfig::default();
    seed(&conn, "contracts", "C-1", contract("2024-01-11"));

    let scanner = scanner(&conn, &clock, &config);
    let service = notifications(&conn, &clock, &config);
    service.scan_and_reconcile(&scanner, 120, READER).unwrap();
    service.mark_read(READER, "contract_C-1").unwrap();

    let store = SqliteRecordStore::new(&conn);
    assert!(store.delete_record("contracts", "C-1").unwrap());
    let stats = service
        .apply_candidates(&scanner.scan(120).unwrap())
        .unwrap();
    assert_eq!(stats.orphaned, 1);
    assert_eq!(stats.retired, 0);
    assert!(service.list(READER).unwrap().is_empty());

    seed(
        &conn,
        "contracts",
        "C-1",
        json!({"status": "active", "end_date": "2024-01-11", "contract_number": "NEW"}),
    );
    let listed = service.scan_and_reconcile(&scanner, 120, READER).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, "contract_C-1");
    assert!(!listed[0].read);
    assert!(listed[0].message.contains("NEW"));
    assert_eq!(service.unread_count(READER).unwrap(), 1);
}

#[test]
fn stale_alert_with_live_source_keeps_read_state() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(NOW);
    let config = EngineConfig::default();
    seed(&conn, "contracts", "C-1", contract("2024-01-11"));

    let scanner = scanner(&conn, &clock, &config);
    let service = notifications(&conn, &clock, &config);
    service.scan_and_reconcile(&scanner, 120, READER).unwrap();
    service.mark_read(READER, "contract_C-1").unwrap();

    // Out of the window but still on file.
    clock.advance_days(12);
    let stats = service
        .apply_candidates(&scanner.scan(120).unwrap())
        .unwrap();
    assert_eq!(stats.orphaned, 0);

    let listed = service.list(READER).unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].stale);
    assert!(listed[0].read);
}

#[test]
fn extreme_end_date_is_skipped_without_aborting_the_scan() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(NOW);
    let config = EngineConfig::default();
    seed(
        &conn,
        "contracts",
        "bad",
        json!({"status": "active", "end_date": i64::MIN}),
    );
    seed(
        &conn,
        "contracts",
        "huge",
        json!({"status": "active", "end_date": i64::MAX}),
    );
    seed(&conn, "contracts", "good", contract("2024-01-11"));

    let candidates = scanner(&conn, &clock, &config).scan(120).unwrap();
    let ids: Vec<&str> = candidates.iter().map(|c| c.source_id.as_str()).collect();
    assert_eq!(ids, vec!["good"]);
}

#[test]
fn non_object_contract_payload_is_skipped() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(NOW);
    let config = EngineConfig::default();
    conn.execute(
        "INSERT INTO records (collection, record_id, payload) VALUES ('contracts', 'bad', '[1]');",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO records (collection, record_id, payload) VALUES ('contracts', 'torn', '{\"status\":');",
        [],
    )
    .unwrap();
    seed(&conn, "contracts", "good", contract("2024-01-11"));

    let scanner = scanner(&conn, &clock, &config);
    let candidates = scanner.scan(120).unwrap();
    let ids: Vec<&str> = candidates.iter().map(|c| c.source_id.as_str()).collect();
    assert_eq!(ids, vec!["good"]);

    let listed = notifications(&conn, &clock, &config)
        .scan_and_reconcile(&scanner, 120, READER)
        .unwrap();
    assert_eq!(listed.len(), 1);
}
