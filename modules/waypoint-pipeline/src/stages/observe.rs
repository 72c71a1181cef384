//! Catch-all audit subscriber. Emits nothing and touches no store.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use waypoint_engine::Handler;
use waypoint_events::Event;

use crate::audit::AuditSink;

pub struct ObserverStage {
    sink: Arc<dyn AuditSink>,
}

impl ObserverStage {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Handler for ObserverStage {
    fn name(&self) -> &str {
        "observe"
    }

    async fn handle(&self, event: &Event) -> Result<Vec<Event>> {
        self.sink.append(event).await?;
        Ok(vec![])
    }
}
