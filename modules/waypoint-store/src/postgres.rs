//! Postgres backend.
//!
//! One table, primary key `(hk, sk)`, and one partial B-tree index per
//! access path. Key columns use the "C" collation so ordering is bytewise,
//! matching `MemoryTable`.

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::PgPool;
use tracing::info;
use waypoint_common::config::validate_table_name;

use crate::backend::TableBackend;
use crate::error::StoreError;
use crate::types::{KeyIndex, PrimaryKey, Record, SortRange};

#[derive(Clone)]
pub struct PgTable {
    pool: PgPool,
    table: String,
}

impl PgTable {
    /// The table name is interpolated into SQL and must be a plain identifier.
    pub fn new(pool: PgPool, table: impl Into<String>) -> Result<Self, StoreError> {
        let table = table.into();
        validate_table_name(&table).map_err(|e| StoreError::InvalidTableName(e.to_string()))?;
        Ok(Self { pool, table })
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Create the table and its five indexes. Idempotent.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        let t = &self.table;
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {t} (
                hk         TEXT COLLATE "C" NOT NULL,
                sk         TEXT COLLATE "C" NOT NULL,
                k1sk       TEXT COLLATE "C",
                k2sk       TEXT COLLATE "C",
                attributes JSONB       NOT NULL DEFAULT '{{}}'::jsonb,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (hk, sk)
            )
            "#
        ))
        .execute(&self.pool)
        .await?;

        for index in KeyIndex::ALL {
            let partition = index.partition_column();
            let sort = index.sort_column();
            let tiebreak = index.tiebreak_column();
            let name = index.name().to_lowercase();
            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS {t}_{name} ON {t} ({partition}, {sort}, {tiebreak}) \
                 WHERE {partition} IS NOT NULL"
            ))
            .execute(&self.pool)
            .await?;
        }

        info!(table = t.as_str(), "Multi-index table ready");
        Ok(())
    }
}

#[async_trait]
impl TableBackend for PgTable {
    async fn put(&self, record: &Record) -> Result<(), StoreError> {
        record.validate()?;
        let t = &self.table;
        sqlx::query(&format!(
            r#"
            INSERT INTO {t} (hk, sk, k1sk, k2sk, attributes, updated_at)
            VALUES ($1, $2, $3, $4, $5, now())
            ON CONFLICT (hk, sk) DO UPDATE SET
                k1sk = EXCLUDED.k1sk,
                k2sk = EXCLUDED.k2sk,
                attributes = EXCLUDED.attributes,
                updated_at = EXCLUDED.updated_at
            "#
        ))
        .bind(&record.hk)
        .bind(&record.sk)
        .bind(&record.k1sk)
        .bind(&record.k2sk)
        .bind(Value::Object(record.attributes.clone()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, key: &PrimaryKey) -> Result<Option<Record>, StoreError> {
        let t = &self.table;
        let row = sqlx::query_as::<_, (String, String, Option<String>, Option<String>, Value)>(
            &format!("SELECT hk, sk, k1sk, k2sk, attributes FROM {t} WHERE hk = $1 AND sk = $2"),
        )
        .bind(&key.hk)
        .bind(&key.sk)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(hk, sk, k1sk, k2sk, attributes)| Record {
            hk,
            sk,
            k1sk,
            k2sk,
            attributes: match attributes {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }))
    }

    async fn query(
        &self,
        index: KeyIndex,
        partition: &str,
        range: &SortRange,
    ) -> Result<Vec<PrimaryKey>, StoreError> {
        let t = &self.table;
        let partition_col = index.partition_column();
        let sort_col = index.sort_column();
        let tiebreak_col = index.tiebreak_column();

        let condition = match range {
            SortRange::All => String::new(),
            SortRange::Eq(_) => format!("AND {sort_col} = $2"),
            SortRange::BeginsWith(_) => format!("AND starts_with({sort_col}, $2)"),
            SortRange::Between(_, _) => format!("AND {sort_col} BETWEEN $2 AND $3"),
        };
        let sql = format!(
            "SELECT hk, sk FROM {t} WHERE {partition_col} = $1 {condition} \
             ORDER BY {sort_col}, {tiebreak_col}"
        );

        let mut query = sqlx::query_as::<_, (String, String)>(&sql).bind(partition);
        query = match range {
            SortRange::All => query,
            SortRange::Eq(v) | SortRange::BeginsWith(v) => query.bind(v),
            SortRange::Between(lo, hi) => query.bind(lo).bind(hi),
        };

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|(hk, sk)| PrimaryKey { hk, sk })
            .collect())
    }
}
