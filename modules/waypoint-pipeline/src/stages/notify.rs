//! Loaded → push to connected consumers. Reads the store, never writes it.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};
use waypoint_engine::Handler;
use waypoint_events::Event;
use waypoint_store::Table;

use crate::delivery::{Delivery, Notification};
use crate::entities::{location_key, Entity, Location};
use crate::error::NotifyError;
use crate::registry::ConnectionRegistry;

pub struct NotifyStage {
    table: Table,
    registry: Arc<dyn ConnectionRegistry>,
    delivery: Arc<dyn Delivery>,
}

impl NotifyStage {
    pub fn new(
        table: Table,
        registry: Arc<dyn ConnectionRegistry>,
        delivery: Arc<dyn Delivery>,
    ) -> Self {
        Self {
            table,
            registry,
            delivery,
        }
    }

    /// Read back the loaded location and push it to every interested
    /// connection. Returns the number of successful deliveries.
    pub async fn notify(&self, event: &Event) -> Result<usize, NotifyError> {
        let id = event.detail_str("id").ok_or(NotifyError::MissingId)?;

        let key = location_key(id);
        let record = self
            .table
            .get(&key)
            .await?
            .ok_or_else(|| NotifyError::RecordMissing(key.to_string()))?;
        let location = Location::from_record(&record)?;

        let connections = self
            .registry
            .connections_for(id)
            .await
            .map_err(|e| NotifyError::Registry(format!("{e:#}")))?;

        let notification = Notification {
            event_id: event.id,
            location,
        };

        let attempted = connections.len();
        let mut failed = 0;
        for connection in &connections {
            if let Err(e) = self.delivery.deliver(connection, &notification).await {
                failed += 1;
                warn!(
                    connection_id = connection.connection_id.as_str(),
                    location_id = id,
                    error = %e,
                    "Delivery failed"
                );
            }
        }

        if failed > 0 {
            return Err(NotifyError::Delivery { failed, attempted });
        }
        debug!(location_id = id, delivered = attempted, "Notified connections");
        Ok(attempted)
    }
}

#[async_trait]
impl Handler for NotifyStage {
    fn name(&self) -> &str {
        "notify"
    }

    async fn handle(&self, event: &Event) -> Result<Vec<Event>> {
        self.notify(event).await?;
        Ok(vec![])
    }
}
