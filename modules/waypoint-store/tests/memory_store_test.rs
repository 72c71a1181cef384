//! Access-pattern tests against the in-memory backend.
//! These need no Postgres. The same contract is exercised against
//! Postgres in pg_store_test.rs.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use waypoint_store::{KeyIndex, MemoryTable, PrimaryKey, Record, SortRange, Table, TableBackend};

fn attrs(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn location(id: &str, group: Option<&str>, bucket: Option<&str>) -> Record {
    Record::new(PrimaryKey::new(format!("LOCATION#{id}"), "META"))
        .with_k1(group.map(|g| format!("GROUP#{g}")))
        .with_k2(bucket.map(|b| format!("GEO#{b}")))
        .with_attributes(attrs(json!({"id": id})))
}

fn table() -> (Arc<MemoryTable>, Table) {
    let memory = Arc::new(MemoryTable::new());
    (memory.clone(), Table::new(memory))
}

// =========================================================================
// Primary access
// =========================================================================

#[tokio::test]
async fn get_returns_full_record() {
    let (_, table) = table();
    let record = location("L1", Some("north"), None);
    table.put(&record).await.unwrap();

    let fetched = table.get(&record.key()).await.unwrap().unwrap();
    assert_eq!(fetched, record);
    assert_eq!(fetched.attr_str("id"), Some("L1"));
}

#[tokio::test]
async fn get_missing_key_is_none() {
    let (_, table) = table();
    let fetched = table.get(&PrimaryKey::new("LOCATION#nope", "META")).await.unwrap();
    assert!(fetched.is_none());
}

#[tokio::test]
async fn identical_put_is_idempotent() {
    let (memory, table) = table();
    let record = location("L1", Some("north"), Some("9q8yy"));

    table.put(&record).await.unwrap();
    let once = memory.records();
    table.put(&record).await.unwrap();

    assert_eq!(memory.records(), once);
    assert_eq!(
        table.by_k1_hk("GROUP#north", &SortRange::All).await.unwrap(),
        vec![record.key()]
    );
}

#[tokio::test]
async fn invalid_record_is_rejected() {
    let (memory, table) = table();
    let err = table
        .put(&Record::new(PrimaryKey::new("", "META")))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("HK"));
    assert!(memory.is_empty());
}

// =========================================================================
// Secondary access patterns
// =========================================================================

#[tokio::test]
async fn shared_k1_records_come_back_ordered_by_sk() {
    let (_, table) = table();
    // Two edges under the same group, distinct SKs, inserted out of order.
    table
        .put(
            &Record::new(PrimaryKey::new("ROUTE#R1", "STOP#02"))
                .with_k1(Some("DEPOT#A".into())),
        )
        .await
        .unwrap();
    table
        .put(
            &Record::new(PrimaryKey::new("ROUTE#R2", "STOP#01"))
                .with_k1(Some("DEPOT#A".into())),
        )
        .await
        .unwrap();

    let keys = table.by_k1_sk("DEPOT#A", &SortRange::All).await.unwrap();
    assert_eq!(
        keys,
        vec![
            PrimaryKey::new("ROUTE#R2", "STOP#01"),
            PrimaryKey::new("ROUTE#R1", "STOP#02"),
        ]
    );
}

#[tokio::test]
async fn shared_k1_records_come_back_ordered_by_hk() {
    let (_, table) = table();
    table.put(&location("L2", Some("north"), None)).await.unwrap();
    table.put(&location("L1", Some("north"), None)).await.unwrap();
    table.put(&location("L3", Some("south"), None)).await.unwrap();

    let keys = table.by_k1_hk("GROUP#north", &SortRange::All).await.unwrap();
    let hks: Vec<_> = keys.iter().map(|k| k.hk.as_str()).collect();
    assert_eq!(hks, vec!["LOCATION#L1", "LOCATION#L2"]);
}

#[tokio::test]
async fn k2_paths_answer_bucket_lookups() {
    let (_, table) = table();
    table.put(&location("L1", None, Some("9q8yy"))).await.unwrap();
    table.put(&location("L2", None, Some("9q8yy"))).await.unwrap();
    table.put(&location("L3", None, Some("9q8yz"))).await.unwrap();

    let by_hk = table.by_k2_hk("GEO#9q8yy", &SortRange::All).await.unwrap();
    assert_eq!(by_hk.len(), 2);
    assert_eq!(by_hk[0].hk, "LOCATION#L1");

    let by_sk = table.by_k2_sk("GEO#9q8yz", &SortRange::Eq("META".into())).await.unwrap();
    assert_eq!(by_sk, vec![PrimaryKey::new("LOCATION#L3", "META")]);
}

#[tokio::test]
async fn reverse_lookup_finds_every_record_with_sort_key() {
    let (_, table) = table();
    table.put(&location("L2", None, None)).await.unwrap();
    table.put(&location("L1", None, None)).await.unwrap();
    table
        .put(&Record::new(PrimaryKey::new("WS#c1", "CONNECTION")))
        .await
        .unwrap();

    let keys = table.by_sk_hk("META", &SortRange::All).await.unwrap();
    let hks: Vec<_> = keys.iter().map(|k| k.hk.as_str()).collect();
    assert_eq!(hks, vec!["LOCATION#L1", "LOCATION#L2"]);

    let prefixed = table
        .by_sk_hk("META", &SortRange::BeginsWith("LOCATION#L2".into()))
        .await
        .unwrap();
    assert_eq!(prefixed.len(), 1);
}

#[tokio::test]
async fn range_conditions_apply_to_index_sort_key() {
    let (_, table) = table();
    for stop in ["STOP#01", "STOP#02", "STOP#03", "STOP#10"] {
        table
            .put(&Record::new(PrimaryKey::new("ROUTE#R1", stop)).with_k1(Some("DEPOT#A".into())))
            .await
            .unwrap();
    }

    let between = table
        .by_k1_sk("DEPOT#A", &SortRange::Between("STOP#02".into(), "STOP#03".into()))
        .await
        .unwrap();
    let sks: Vec<_> = between.iter().map(|k| k.sk.as_str()).collect();
    assert_eq!(sks, vec!["STOP#02", "STOP#03"]);

    let prefix = table
        .by_k1_sk("DEPOT#A", &SortRange::BeginsWith("STOP#0".into()))
        .await
        .unwrap();
    assert_eq!(prefix.len(), 3);
}

#[tokio::test]
async fn every_populated_index_returns_the_written_key() {
    let memory = MemoryTable::new();
    let record = location("L1", Some("north"), Some("9q8yy"));
    memory.put(&record).await.unwrap();

    for index in KeyIndex::ALL {
        let (partition, _) = record.index_entry(index).unwrap();
        let keys = memory.query(index, partition, &SortRange::All).await.unwrap();
        assert_eq!(keys, vec![record.key()], "index {index}");
    }
}

#[tokio::test]
async fn absent_related_keys_are_not_indexed() {
    let memory = MemoryTable::new();
    let record = location("L1", None, None);
    memory.put(&record).await.unwrap();

    assert!(record.index_entry(KeyIndex::K1Sk).is_none());
    assert!(memory
        .query(KeyIndex::K1Sk, "GROUP#north", &SortRange::All)
        .await
        .unwrap()
        .is_empty());
}

// =========================================================================
// Hydration
// =========================================================================

#[tokio::test]
async fn hydrate_refetches_in_index_order() {
    let (_, table) = table();
    table.put(&location("L1", Some("north"), None)).await.unwrap();
    table.put(&location("L2", Some("north"), None)).await.unwrap();

    let keys = table.by_k1_hk("GROUP#north", &SortRange::All).await.unwrap();
    let mut with_missing = keys.clone();
    with_missing.push(PrimaryKey::new("LOCATION#gone", "META"));

    let records = table.hydrate(&with_missing).await.unwrap();
    let ids: Vec<_> = records.iter().filter_map(|r| r.attr_str("id")).collect();
    assert_eq!(ids, vec!["L1", "L2"]);
}

#[tokio::test]
async fn concurrent_writers_to_same_key_leave_one_consistent_record() {
    let memory = Arc::new(MemoryTable::new());
    let table = Table::new(memory.clone());

    let mut tasks = Vec::new();
    for group in ["a", "b", "c", "d"] {
        let table = table.clone();
        tasks.push(tokio::spawn(async move {
            table.put(&location("L1", Some(group), None)).await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let stored = memory.records();
    assert_eq!(stored.len(), 1);
    let winner = stored[0].k1sk.clone().unwrap();

    // Exactly one group index entry survives, and it matches the stored row.
    let mut indexed = 0;
    for group in ["a", "b", "c", "d"] {
        let keys = table.by_k1_hk(&format!("GROUP#{group}"), &SortRange::All).await.unwrap();
        if !keys.is_empty() {
            indexed += 1;
            assert_eq!(format!("GROUP#{group}"), winner);
        }
    }
    assert_eq!(indexed, 1);
}
