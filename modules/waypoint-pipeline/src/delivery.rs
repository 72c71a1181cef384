use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::entities::{Connection, Location};

/// Payload pushed to a connected consumer when a location has been loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// The Loaded event this notification answers.
    pub event_id: Uuid,
    pub location: Location,
}

/// Pluggable push transport for the Notify stage.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(&self, connection: &Connection, notification: &Notification) -> anyhow::Result<()>;
}

/// Logs each push instead of sending it. Used by the binary.
pub struct LogDelivery;

#[async_trait]
impl Delivery for LogDelivery {
    async fn deliver(&self, connection: &Connection, notification: &Notification) -> anyhow::Result<()> {
        info!(
            connection_id = connection.connection_id.as_str(),
            endpoint = connection.endpoint.as_deref().unwrap_or("-"),
            location_id = notification.location.id.as_str(),
            event_id = %notification.event_id,
            "Notification delivered"
        );
        Ok(())
    }
}

/// Records deliveries in memory for inspection.
#[derive(Default)]
pub struct MemoryDelivery {
    sent: Mutex<Vec<(String, Notification)>>,
}

impl MemoryDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(connection id, notification)` pairs in delivery order.
    pub fn sent(&self) -> Vec<(String, Notification)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Delivery for MemoryDelivery {
    async fn deliver(&self, connection: &Connection, notification: &Notification) -> anyhow::Result<()> {
        self.sent
            .lock()
            .map_err(|_| anyhow::anyhow!("delivery log poisoned"))?
            .push((connection.connection_id.clone(), notification.clone()));
        Ok(())
    }
}
