//! In-memory backend. Thread-safe; used by tests and local runs.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::backend::TableBackend;
use crate::error::StoreError;
use crate::types::{KeyIndex, PrimaryKey, Record, SortRange};

/// Index entry: (partition, sort, tie-breaker). Set order is query order.
type IndexEntry = (String, String, String);

#[derive(Default)]
struct Tables {
    items: BTreeMap<PrimaryKey, Record>,
    indexes: HashMap<KeyIndex, BTreeSet<IndexEntry>>,
}

impl Tables {
    fn unindex(&mut self, record: &Record) {
        for index in KeyIndex::ALL {
            if let Some(entry) = entry_for(record, index) {
                if let Some(set) = self.indexes.get_mut(&index) {
                    set.remove(&entry);
                }
            }
        }
    }

    fn index(&mut self, record: &Record) {
        for index in KeyIndex::ALL {
            if let Some(entry) = entry_for(record, index) {
                self.indexes.entry(index).or_default().insert(entry);
            }
        }
    }
}

fn entry_for(record: &Record, index: KeyIndex) -> Option<IndexEntry> {
    let (partition, sort) = record.index_entry(index)?;
    let tiebreak = match index.tiebreak_column() {
        "hk" => record.hk.clone(),
        _ => record.sk.clone(),
    };
    Some((partition.to_string(), sort.to_string(), tiebreak))
}

/// One lock guards the primary map and all indexes, so a put is never
/// visible half-applied.
#[derive(Default)]
pub struct MemoryTable {
    tables: RwLock<Tables>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records (for test assertions).
    pub fn len(&self) -> usize {
        self.tables.read().map(|t| t.items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every record in primary-key order (for test assertions).
    pub fn records(&self) -> Vec<Record> {
        self.tables
            .read()
            .map(|t| t.items.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TableBackend for MemoryTable {
    async fn put(&self, record: &Record) -> Result<(), StoreError> {
        record.validate()?;
        let mut tables = self.tables.write().map_err(|_| StoreError::Poisoned)?;

        if let Some(previous) = tables.items.remove(&record.key()) {
            tables.unindex(&previous);
        }
        tables.index(record);
        tables.items.insert(record.key(), record.clone());
        Ok(())
    }

    async fn get(&self, key: &PrimaryKey) -> Result<Option<Record>, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::Poisoned)?;
        Ok(tables.items.get(key).cloned())
    }

    async fn query(
        &self,
        index: KeyIndex,
        partition: &str,
        range: &SortRange,
    ) -> Result<Vec<PrimaryKey>, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::Poisoned)?;
        let Some(set) = tables.indexes.get(&index) else {
            return Ok(Vec::new());
        };

        let start = (partition.to_string(), String::new(), String::new());
        let keys = set
            .range(start..)
            .take_while(|(p, _, _)| p == partition)
            .filter(|(_, sort, _)| range.contains(sort))
            .map(|(_, sort, tiebreak)| match index.sort_column() {
                "hk" => PrimaryKey::new(sort.clone(), tiebreak.clone()),
                _ => PrimaryKey::new(tiebreak.clone(), sort.clone()),
            })
            .collect();

        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn overwrite_moves_index_entries() {
        let table = MemoryTable::new();
        let key = PrimaryKey::new("LOCATION#L1", "META");

        table
            .put(&Record::new(key.clone()).with_k1(Some("GROUP#north".into())))
            .await
            .unwrap();
        table
            .put(&Record::new(key.clone()).with_k1(Some("GROUP#south".into())))
            .await
            .unwrap();

        let north = table.query(KeyIndex::K1Sk, "GROUP#north", &SortRange::All).await.unwrap();
        let south = table.query(KeyIndex::K1Sk, "GROUP#south", &SortRange::All).await.unwrap();
        assert!(north.is_empty());
        assert_eq!(south, vec![key]);
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn partition_prefix_does_not_leak_into_query() {
        let table = MemoryTable::new();
        table
            .put(&Record::new(PrimaryKey::new("A#1", "META")).with_k1(Some("GROUP#n".into())))
            .await
            .unwrap();
        table
            .put(&Record::new(PrimaryKey::new("A#2", "META")).with_k1(Some("GROUP#north".into())))
            .await
            .unwrap();

        let keys = table.query(KeyIndex::K1Hk, "GROUP#n", &SortRange::All).await.unwrap();
        assert_eq!(keys, vec![PrimaryKey::new("A#1", "META")]);
    }
}
