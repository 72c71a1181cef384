//! Sinks for the Observer's audit trail.

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;
use waypoint_events::Event;

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, event: &Event) -> anyhow::Result<()>;
}

/// Writes each event at `info` to the `waypoint::audit` target.
pub struct TracingAudit;

#[async_trait]
impl AuditSink for TracingAudit {
    async fn append(&self, event: &Event) -> anyhow::Result<()> {
        let detail = serde_json::to_string(&event.detail)?;
        info!(
            target: "waypoint::audit",
            event_id = %event.id,
            source = event.source.as_str(),
            detail_type = event.detail_type.as_str(),
            time = %event.time,
            caused_by = ?event.caused_by,
            detail = detail.as_str(),
            "Event observed"
        );
        Ok(())
    }
}

/// Keeps the audit trail in memory.
#[derive(Default)]
pub struct MemoryAudit {
    events: Mutex<Vec<Event>>,
}

impl MemoryAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AuditSink for MemoryAudit {
    async fn append(&self, event: &Event) -> anyhow::Result<()> {
        self.events
            .lock()
            .map_err(|_| anyhow::anyhow!("audit log poisoned"))?
            .push(event.clone());
        Ok(())
    }
}
