//! Read-side lookups over the shared table, one per access pattern.

use anyhow::Result;
use waypoint_store::{PrimaryKey, SortRange, Table};

use crate::entities::{
    location_key, Connection, Entity, GeoPoint, KeyLayout, Location, CONNECTION_SK, GROUP_PREFIX,
    LOCATION_PREFIX, META_SK,
};

pub struct LocationQuery {
    table: Table,
    layout: KeyLayout,
}

impl LocationQuery {
    pub fn new(table: Table, layout: KeyLayout) -> Self {
        Self { table, layout }
    }

    /// `HK,SK` get.
    pub async fn get(&self, id: &str) -> Result<Option<Location>> {
        match self.table.get(&location_key(id)).await? {
            Some(record) => Ok(Some(Location::from_record(&record)?)),
            None => Ok(None),
        }
    }

    /// Locations in `group`, ordered by HK.
    pub async fn in_group(&self, group: &str) -> Result<Vec<Location>> {
        let keys = self
            .table
            .by_k1_hk(&format!("{GROUP_PREFIX}{group}"), &Self::locations())
            .await?;
        self.decode(&keys).await
    }

    /// Locations sharing the geographic bucket of `(lat, lng)`, ordered by HK.
    pub async fn in_bucket(&self, lat: f64, lng: f64) -> Result<Vec<Location>> {
        let bucket = self.layout.geo_bucket(&GeoPoint { lat, lng })?;
        let keys = self.table.by_k2_hk(&bucket, &Self::locations()).await?;
        self.decode(&keys).await
    }

    /// Connections whose watch points at `id`. A disconnect clears the watch,
    /// so only live connections are returned.
    pub async fn watchers(&self, id: &str) -> Result<Vec<Connection>> {
        let keys = self
            .table
            .by_k2_hk(&format!("{LOCATION_PREFIX}{id}"), &SortRange::All)
            .await?;
        self.decode(&keys).await
    }

    /// Every known connection, via the `SK,HK` reverse index.
    pub async fn connections(&self) -> Result<Vec<Connection>> {
        let keys = self.table.by_sk_hk(CONNECTION_SK, &SortRange::All).await?;
        self.decode(&keys).await
    }

    /// Location ids, via the `SK,HK` reverse index on `META`.
    pub async fn location_ids(&self) -> Result<Vec<String>> {
        let keys = self
            .table
            .by_sk_hk(META_SK, &SortRange::BeginsWith(LOCATION_PREFIX.into()))
            .await?;
        Ok(keys
            .into_iter()
            .filter_map(|k| k.hk.strip_prefix(LOCATION_PREFIX).map(str::to_string))
            .collect())
    }

    fn locations() -> SortRange {
        SortRange::BeginsWith(LOCATION_PREFIX.into())
    }

    async fn decode<E: Entity>(&self, keys: &[PrimaryKey]) -> Result<Vec<E>> {
        let records = self.table.hydrate(keys).await?;
        records
            .iter()
            .map(|r| E::from_record(r).map_err(anyhow::Error::from))
            .collect()
    }
}
