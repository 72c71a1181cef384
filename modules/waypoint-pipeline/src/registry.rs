//! Connection registry consumed by the Notify stage.
//!
//! Connections are WS-family records in the shared table. Live connections
//! carry `K1SK = WS#CONNECTED`, so the registry is one `K1SK,HK` index query
//! followed by a hydrate.

use async_trait::async_trait;
use tracing::warn;
use waypoint_store::{SortRange, Table};

use crate::entities::{Connection, Entity, CONNECTED_K1};

#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// Connected consumers interested in `location_id`. Read-only.
    async fn connections_for(&self, location_id: &str) -> anyhow::Result<Vec<Connection>>;
}

pub struct StoreConnectionRegistry {
    table: Table,
}

impl StoreConnectionRegistry {
    pub fn new(table: Table) -> Self {
        Self { table }
    }
}

#[async_trait]
impl ConnectionRegistry for StoreConnectionRegistry {
    async fn connections_for(&self, location_id: &str) -> anyhow::Result<Vec<Connection>> {
        let keys = self.table.by_k1_hk(CONNECTED_K1, &SortRange::All).await?;
        let records = self.table.hydrate(&keys).await?;

        let mut connections = Vec::with_capacity(records.len());
        for record in &records {
            match Connection::from_record(record) {
                Ok(connection) if connection.wants(location_id) => connections.push(connection),
                Ok(_) => {}
                Err(e) => {
                    warn!(hk = record.hk.as_str(), error = %e, "Skipping undecodable connection record");
                }
            }
        }
        Ok(connections)
    }
}
