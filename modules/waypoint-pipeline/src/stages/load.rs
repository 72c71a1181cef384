//! Transformed → store write → Loaded, for one entity family.

use std::marker::PhantomData;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;
use waypoint_common::DetailType;
use waypoint_engine::Handler;
use waypoint_events::Event;
use waypoint_store::Table;

use crate::entities::{Connection, Entity, KeyLayout, Location};
use crate::error::LoadError;

pub struct LoadStage<E> {
    name: String,
    table: Table,
    layout: KeyLayout,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> LoadStage<E> {
    pub fn new(table: Table, layout: KeyLayout) -> Self {
        Self {
            name: format!("load-{}", E::FAMILY.as_str().to_lowercase()),
            table,
            layout,
            _entity: PhantomData,
        }
    }

    /// Upsert the entity carried by `event` and return its id. A single put,
    /// so a replay of the same payload rewrites the same record.
    pub async fn load(&self, event: &Event) -> Result<String, LoadError> {
        let entity: E = serde_json::from_value(event.detail.clone()).map_err(|source| {
            LoadError::InvalidPayload {
                family: E::FAMILY.as_str(),
                source,
            }
        })?;
        let record = entity.to_record(&self.layout)?;
        self.table.put(&record).await?;
        Ok(entity.id().to_string())
    }
}

pub type LocationLoad = LoadStage<Location>;
pub type ConnectionLoad = LoadStage<Connection>;

#[async_trait]
impl<E: Entity> Handler for LoadStage<E> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: &Event) -> Result<Vec<Event>> {
        let id = self.load(event).await?;
        debug!(family = E::FAMILY.as_str(), id = id.as_str(), "Loaded entity");

        Ok(vec![Event::of(
            E::FAMILY,
            DetailType::Loaded,
            json!({ "id": id }),
        )])
    }
}
