use recordkeep_core::db::open_db_in_memory;
use recordkeep_core::{
    EngineConfig, EntityType, ManualClock, PurgeOutcome, RecordPayload, RecordStore,
    SqliteRecordStore, SqliteTrashRepository, TrashError, TrashListQuery, TrashService, DAY_MS,
};
use rusqlite::{params, Connection};
use serde_json::json;
use uuid::Uuid;

const NOW: i64 = 1_704_067_200_000;

fn service<'conn>(
    conn: &'conn Connection,
    clock: &ManualClock,
) -> TrashService<SqliteTrashRepository<'conn>, ManualClock> {
    TrashService::new(
        SqliteTrashRepository::new(conn),
        clock.clone(),
        &EngineConfig::default(),
    )
}

fn payload(value: serde_json::Value) -> RecordPayload {
    value.as_object().unwrap().clone()
}

fn seed(conn: &Connection, collection: &str, record_id: &str, value: serde_json::Value) {
    SqliteRecordStore::new(conn)
        .insert_record(collection, record_id, &payload(value))
        .unwrap();
}

fn raw_record(conn: &Connection, collection: &str, record_id: &str) -> Option<String> {
    let mut stmt = conn
        .prepare("SELECT payload FROM records WHERE collection = ?1 AND record_id = ?2;")
        .unwrap();
    let mut rows = stmt.query(params![collection, record_id]).unwrap();
    rows.next().unwrap().map(|row| row.get(0).unwrap())
}

#[test]
fn moved_company_is_listed_with_thirty_day_expiry() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(NOW);
    seed(&conn, "companies", "co-5", json!({"name": "Acme", "cnpj": "123"}));

    let trash = service(&conn, &clock);
    let entry = trash
        .move_to_trash(EntityType::Company, "companies", "co-5", "user-1")
        .unwrap();

    assert_eq!(entry.deleted_at, NOW);
    assert_eq!(entry.expires_at, NOW + 30 * DAY_MS);
    assert_eq!(entry.deleted_by, "user-1");
    assert_eq!(entry.label, "Acme");
    assert_eq!(entry.snapshot.payload.get("cnpj"), Some(&json!("123")));

    let listed = trash.list(&TrashListQuery::default()).unwrap();
    assert_eq!(listed, vec![entry]);
    assert!(SqliteRecordStore::new(&conn)
        .get_record("companies", "co-5")
        .unwrap()
        .is_none());
}

#[test]
fn moving_missing_record_fails_and_writes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(NOW);
    let trash = service(&conn, &clock);

    let err = trash
        .move_to_trash(EntityType::Company, "companies", "co-404", "user-1")
        .unwrap_err();

    assert!(matches!(
        err,
        TrashError::RecordNotFound { ref collection, ref record_id }
            if collection == "companies" && record_id == "co-404"
    ));
    assert!(trash.list(&TrashListQuery::default()).unwrap().is_empty());
}

#[test]
fn restore_reinserts_exact_payload_text_and_removes_entry() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(NOW);
    let original = r#"{"number": 7,   "title":"Permit", "nested":{"b":2,"a":1}}"#;
    conn.execute(
        "INSERT INTO records (collection, record_id, payload) VALUES ('processes', 'p-7', ?1);",
        [original],
    )
    .unwrap();

    let trash = service(&conn, &clock);
    let entry = trash
        .move_to_trash(EntityType::Process, "processes", "p-7", "user-2")
        .unwrap();
    assert_eq!(raw_record(&conn, "processes", "p-7"), None);

    clock.advance_days(3);
    let restored = trash.restore(entry.id).unwrap();

    assert_eq!(restored.id, entry.id);
    assert_eq!(raw_record(&conn, "processes", "p-7").as_deref(), Some(original));
    assert!(trash.get(entry.id).unwrap().is_none());
    assert!(trash.list(&TrashListQuery::default()).unwrap().is_empty());
}

#[test]
fn restore_conflicts_with_recreated_record_and_keeps_entry() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(NOW);
    seed(&conn, "companies", "co-5", json!({"name": "Acme"}));

    let trash = service(&conn, &clock);
    let entry = trash
        .move_to_trash(EntityType::Company, "companies", "co-5", "user-1")
        .unwrap();
    seed(&conn, "companies", "co-5", json!({"name": "Acme Reborn"}));

    let err = trash.restore(entry.id).unwrap_err();
    assert!(matches!(
        err,
        TrashError::Conflict { ref collection, ref record_id }
            if collection == "companies" && record_id == "co-5"
    ));

    assert_eq!(trash.require(entry.id).unwrap(), entry);
    let live = SqliteRecordStore::new(&conn)
        .get_record("companies", "co-5")
        .unwrap()
        .unwrap();
    assert_eq!(live.get("name"), Some(&json!("Acme Reborn")));
}

#[test]
fn purge_is_idempotent_and_blocks_restore() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(NOW);
    seed(&conn, "contracts", "C-1", json!({"contract_number": "001/2024"}));

    let trash = service(&conn, &clock);
    let entry = trash
        .move_to_trash(EntityType::Contract, "contracts", "C-1", "user-1")
        .unwrap();

    assert_eq!(trash.purge(entry.id).unwrap(), PurgeOutcome::Purged);
    assert_eq!(trash.purge(entry.id).unwrap(), PurgeOutcome::AlreadyGone);
    assert!(matches!(
        trash.restore(entry.id).unwrap_err(),
        TrashError::NotFound(id) if id == entry.id
    ));
    assert!(SqliteRecordStore::new(&conn)
        .get_record("contracts", "C-1")
        .unwrap()
        .is_none());
}

#[test]
fn unknown_entry_ids_are_not_found() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(NOW);
    let trash = service(&conn, &clock);
    let id = Uuid::new_v4();

    assert!(matches!(trash.restore(id).unwrap_err(), TrashError::NotFound(_)));
    assert!(matches!(trash.require(id).unwrap_err(), TrashError::NotFound(_)));
    assert!(trash.get(id).unwrap().is_none());
    assert_eq!(trash.purge(id).unwrap(), PurgeOutcome::AlreadyGone);
}

#[test]
fn record_can_be_trashed_again_after_restore() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(NOW);
    seed(&conn, "documents", "d-1", json!({"title": "Invoice"}));

    let trash = service(&conn, &clock);
    let first = trash
        .move_to_trash(EntityType::Document, "documents", "d-1", "user-1")
        .unwrap();
    trash.restore(first.id).unwrap();
    clock.advance_ms(1);
    let second = trash
        .move_to_trash(EntityType::Document, "documents", "d-1", "user-1")
        .unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(second.deleted_at, NOW + 1);
    assert_eq!(trash.list(&TrashListQuery::default()).unwrap().len(), 1);
}

#[test]
fn list_orders_newest_first_and_filters() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(NOW);
    seed(&conn, "companies", "co-1", json!({"name": "ACME Corp"}));
    seed(&conn, "companies", "co-2", json!({"name": "Globex"}));
    seed(&conn, "contracts", "ct-9", json!({"contract_number": "100%"}));

    let trash = service(&conn, &clock);
    let acme = trash
        .move_to_trash(EntityType::Company, "companies", "co-1", "user-1")
        .unwrap();
    clock.advance_ms(10);
    let globex = trash
        .move_to_trash(EntityType::Company, "companies", "co-2", "user-1")
        .unwrap();
    clock.advance_ms(10);
    let contract = trash
        .move_to_trash(EntityType::Contract, "contracts", "ct-9", "user-1")
        .unwrap();

    let ids = |query: TrashListQuery| -> Vec<Uuid> {
        trash
            .list(&query)
            .unwrap()
            .into_iter()
            .map(|entry| entry.id)
            .collect()
    };

    assert_eq!(
        ids(TrashListQuery::default()),
        vec![contract.id, globex.id, acme.id]
    );
    assert_eq!(
        ids(TrashListQuery {
            entity_type: Some(EntityType::Company),
            ..TrashListQuery::default()
        }),
        vec![globex.id, acme.id]
    );
    assert_eq!(
        ids(TrashListQuery {
            search_text: Some("acme".to_string()),
            ..TrashListQuery::default()
        }),
        vec![acme.id]
    );
    assert_eq!(
        ids(TrashListQuery {
            search_text: Some("CT-".to_string()),
            ..TrashListQuery::default()
        }),
        vec![contract.id]
    );
    assert_eq!(
        ids(TrashListQuery {
            search_text: Some("0%".to_string()),
            ..TrashListQuery::default()
        }),
        vec![contract.id]
    );
    assert_eq!(
        ids(TrashListQuery {
            limit: Some(1),
            offset: 1,
            ..TrashListQuery::default()
        }),
        vec![globex.id]
    );
    assert!(ids(TrashListQuery {
        entity_type: Some(EntityType::Process),
        ..TrashListQuery::default()
    })
    .is_empty());
}

#[test]
fn search_matches_accented_labels_in_any_case() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(NOW);
    seed(&conn, "companies", "co-1", json!({"name": "ÁGUA Serviços"}));
    seed(&conn, "companies", "co-2", json!({"name": "Água Limpa"}));
    seed(&conn, "companies", "co-3", json!({"name": "Agua Fria"}));

    let trash = service(&conn, &clock);
    let mut moved = Vec::new();
    for record_id in ["co-1", "co-2", "co-3"] {
        moved.push(
            trash
                .move_to_trash(EntityType::Company, "companies", record_id, "user-1")
                .unwrap()
                .id,
        );
        clock.advance_ms(10);
    }

    let ids = |search: &str, limit: Option<u32>, offset: u32| -> Vec<Uuid> {
        trash
            .list(&TrashListQuery {
                search_text: Some(search.to_string()),
                limit,
                offset,
                ..TrashListQuery::default()
            })
            .unwrap()
            .into_iter()
            .map(|entry| entry.id)
            .collect()
    };

    assert_eq!(ids("água", None, 0), vec![moved[1], moved[0]]);
    assert_eq!(ids("SERVIÇOS", None, 0), vec![moved[0]]);
    assert_eq!(ids("água", Some(1), 1), vec![moved[0]]);
    assert_eq!(ids("agua", None, 0), vec![moved[2]]);
}

#[test]
fn summaries_count_down_to_purge() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(NOW);
    seed(&conn, "companies", "co-1", json!({}));

    let trash = service(&conn, &clock);
    trash
        .move_to_trash(EntityType::Company, "companies", "co-1", "user-1")
        .unwrap();

    let fresh = trash.list_summaries(&TrashListQuery::default()).unwrap();
    assert_eq!(fresh[0].label, "co-1");
    assert_eq!(fresh[0].days_until_purge, 30);
    assert!(!fresh[0].expiring_soon);

    clock.advance_days(23);
    let late = trash.list_summaries(&TrashListQuery::default()).unwrap();
    assert_eq!(late[0].days_until_purge, 7);
    assert!(late[0].expiring_soon);
}

#[test]
fn retention_follows_configured_days() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(NOW);
    seed(&conn, "companies", "co-1", json!({"name": "Acme"}));
    let config = EngineConfig::from_toml_str("retention_days = 5").unwrap();

    let trash = TrashService::new(SqliteTrashRepository::new(&conn), clock.clone(), &config);
    let entry = trash
        .move_to_trash(EntityType::Company, "companies", "co-1", "user-1")
        .unwrap();

    assert_eq!(entry.expires_at, NOW + 5 * DAY_MS);
}
