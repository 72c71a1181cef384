//! Integration tests for the Postgres backend.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use serde_json::json;
use sqlx::PgPool;
use waypoint_store::{KeyIndex, PgTable, PrimaryKey, Record, SortRange, TableBackend};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Fresh table per test so tests can run concurrently against one database.
async fn test_table(name: &str) -> Option<PgTable> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;

    sqlx::query(&format!("DROP TABLE IF EXISTS {name}"))
        .execute(&pool)
        .await
        .ok()?;

    let table = PgTable::new(pool, name).ok()?;
    table.migrate().await.ok()?;
    Some(table)
}

fn location(id: &str, group: Option<&str>, bucket: Option<&str>) -> Record {
    let attributes = match json!({"id": id, "name": format!("Depot {id}")}) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    };
    Record::new(PrimaryKey::new(format!("LOCATION#{id}"), "META"))
        .with_k1(group.map(|g| format!("GROUP#{g}")))
        .with_k2(bucket.map(|b| format!("GEO#{b}")))
        .with_attributes(attributes)
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn rejects_table_names_that_are_not_identifiers() {
    // Pool construction is lazy, so no server is needed to check the name.
    let pool = PgPool::connect_lazy("postgres://localhost/unused").unwrap();
    assert!(PgTable::new(pool, "bad name; --").is_err());
}

#[tokio::test]
async fn put_then_get_round_trips_attributes() {
    let Some(table) = test_table("wp_test_get").await else {
        return;
    };
    let record = location("L1", Some("north"), Some("9q8yy"));
    table.put(&record).await.unwrap();

    let fetched = table.get(&record.key()).await.unwrap().unwrap();
    assert_eq!(fetched, record);
}

#[tokio::test]
async fn upsert_replaces_in_place() {
    let Some(table) = test_table("wp_test_upsert").await else {
        return;
    };
    table.put(&location("L1", Some("north"), None)).await.unwrap();
    table.put(&location("L1", Some("south"), None)).await.unwrap();

    assert!(table
        .query(KeyIndex::K1Hk, "GROUP#north", &SortRange::All)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        table
            .query(KeyIndex::K1Hk, "GROUP#south", &SortRange::All)
            .await
            .unwrap(),
        vec![PrimaryKey::new("LOCATION#L1", "META")]
    );
}

#[tokio::test]
async fn every_index_serves_its_access_pattern() {
    let Some(table) = test_table("wp_test_indexes").await else {
        return;
    };
    let record = location("L1", Some("north"), Some("9q8yy"));
    table.put(&record).await.unwrap();

    for index in KeyIndex::ALL {
        let (partition, _) = record.index_entry(index).unwrap();
        let keys = table.query(index, partition, &SortRange::All).await.unwrap();
        assert_eq!(keys, vec![record.key()], "index {index}");
    }
}

#[tokio::test]
async fn ordering_is_bytewise_like_memory_backend() {
    let Some(table) = test_table("wp_test_order").await else {
        return;
    };
    for id in ["b", "B", "a", "A"] {
        table.put(&location(id, Some("g"), None)).await.unwrap();
    }

    let keys = table.query(KeyIndex::K1Hk, "GROUP#g", &SortRange::All).await.unwrap();
    let hks: Vec<_> = keys.iter().map(|k| k.hk.as_str()).collect();
    assert_eq!(
        hks,
        vec!["LOCATION#A", "LOCATION#B", "LOCATION#a", "LOCATION#b"]
    );
}

#[tokio::test]
async fn sort_ranges_translate_to_sql() {
    let Some(table) = test_table("wp_test_ranges").await else {
        return;
    };
    for stop in ["STOP#01", "STOP#02", "STOP#03", "STOP#10"] {
        table
            .put(&Record::new(PrimaryKey::new("ROUTE#R1", stop)).with_k1(Some("DEPOT#A".into())))
            .await
            .unwrap();
    }

    let eq = table
        .query(KeyIndex::K1Sk, "DEPOT#A", &SortRange::Eq("STOP#02".into()))
        .await
        .unwrap();
    assert_eq!(eq.len(), 1);

    let prefix = table
        .query(KeyIndex::K1Sk, "DEPOT#A", &SortRange::BeginsWith("STOP#0".into()))
        .await
        .unwrap();
    assert_eq!(prefix.len(), 3);

    let between = table
        .query(
            KeyIndex::K1Sk,
            "DEPOT#A",
            &SortRange::Between("STOP#02".into(), "STOP#10".into()),
        )
        .await
        .unwrap();
    let sks: Vec<_> = between.iter().map(|k| k.sk.as_str()).collect();
    assert_eq!(sks, vec!["STOP#02", "STOP#03", "STOP#10"]);
}

#[tokio::test]
async fn migrate_is_idempotent() {
    let Some(table) = test_table("wp_test_migrate").await else {
        return;
    };
    table.migrate().await.unwrap();
    table.migrate().await.unwrap();
}
