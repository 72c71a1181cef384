//! Typed accessors over a backend, one per access pattern.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::debug;

use crate::backend::TableBackend;
use crate::error::StoreError;
use crate::types::{KeyIndex, PrimaryKey, Record, SortRange};

/// The shared multi-index table. Cheap to clone.
#[derive(Clone)]
pub struct Table {
    backend: Arc<dyn TableBackend>,
}

impl Table {
    pub fn new(backend: Arc<dyn TableBackend>) -> Self {
        Self { backend }
    }

    /// Upsert one record. Last write wins on an identical `(HK, SK)`.
    pub async fn put(&self, record: &Record) -> Result<(), StoreError> {
        debug!(hk = record.hk.as_str(), sk = record.sk.as_str(), "put");
        self.backend.put(record).await
    }

    /// `HK,SK` direct get.
    pub async fn get(&self, key: &PrimaryKey) -> Result<Option<Record>, StoreError> {
        self.backend.get(key).await
    }

    /// `K1SK,SK`: records sharing a first related key, ordered by SK.
    pub async fn by_k1_sk(&self, k1sk: &str, range: &SortRange) -> Result<Vec<PrimaryKey>, StoreError> {
        self.backend.query(KeyIndex::K1Sk, k1sk, range).await
    }

    /// `K2SK,SK`: records sharing a second related key, ordered by SK.
    pub async fn by_k2_sk(&self, k2sk: &str, range: &SortRange) -> Result<Vec<PrimaryKey>, StoreError> {
        self.backend.query(KeyIndex::K2Sk, k2sk, range).await
    }

    /// `K1SK,HK`: records sharing a first related key, ordered by HK.
    pub async fn by_k1_hk(&self, k1sk: &str, range: &SortRange) -> Result<Vec<PrimaryKey>, StoreError> {
        self.backend.query(KeyIndex::K1Hk, k1sk, range).await
    }

    /// `K2SK,HK`: records sharing a second related key, ordered by HK.
    pub async fn by_k2_hk(&self, k2sk: &str, range: &SortRange) -> Result<Vec<PrimaryKey>, StoreError> {
        self.backend.query(KeyIndex::K2Hk, k2sk, range).await
    }

    /// `SK,HK`: reverse lookup of every record with a given sort key.
    pub async fn by_sk_hk(&self, sk: &str, range: &SortRange) -> Result<Vec<PrimaryKey>, StoreError> {
        self.backend.query(KeyIndex::SkHk, sk, range).await
    }

    /// Re-fetch full records for keys returned by an index query, preserving
    /// order. Keys whose record vanished in between are skipped.
    pub async fn hydrate(&self, keys: &[PrimaryKey]) -> Result<Vec<Record>, StoreError> {
        let fetched = try_join_all(keys.iter().map(|key| self.backend.get(key))).await?;
        Ok(fetched.into_iter().flatten().collect())
    }
}
