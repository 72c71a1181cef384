//! Storage engine contract.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{KeyIndex, PrimaryKey, Record, SortRange};

/// An engine offering equality + range lookups on composite keys.
///
/// Implemented by `PgTable` (production) and `MemoryTable` (tests, local runs).
/// `put` must be a single atomic operation that replaces the primary item and
/// all five index entries together; concurrent puts to the same key resolve
/// last-write-wins.
#[async_trait]
pub trait TableBackend: Send + Sync {
    /// Insert or replace the record at its `(HK, SK)`.
    async fn put(&self, record: &Record) -> Result<(), StoreError>;

    /// Direct get by primary key.
    async fn get(&self, key: &PrimaryKey) -> Result<Option<Record>, StoreError>;

    /// Keys-only index query: records whose partition attribute equals
    /// `partition` and whose sort attribute satisfies `range`, ordered by the
    /// sort attribute (ties broken by the other primary-key attribute).
    async fn query(
        &self,
        index: KeyIndex,
        partition: &str,
        range: &SortRange,
    ) -> Result<Vec<PrimaryKey>, StoreError>;
}

#[async_trait]
impl<B: TableBackend + ?Sized> TableBackend for Arc<B> {
    async fn put(&self, record: &Record) -> Result<(), StoreError> {
        (**self).put(record).await
    }

    async fn get(&self, key: &PrimaryKey) -> Result<Option<Record>, StoreError> {
        (**self).get(key).await
    }

    async fn query(
        &self,
        index: KeyIndex,
        partition: &str,
        range: &SortRange,
    ) -> Result<Vec<PrimaryKey>, StoreError> {
        (**self).query(index, partition, range).await
    }
}
