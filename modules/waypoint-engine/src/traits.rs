//! Core traits for the event bus.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use waypoint_events::Event;

use crate::dead_letter::DeadLetter;

/// A rule target. Stateless between invocations.
///
/// Returns zero or more events that are published back onto the bus. An
/// `Err` is logged and dead-lettered; it never reaches other handlers.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Short stable name used in logs and dead letters.
    fn name(&self) -> &str;

    async fn handle(&self, event: &Event) -> Result<Vec<Event>>;
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn handle(&self, event: &Event) -> Result<Vec<Event>> {
        (**self).handle(event).await
    }
}

/// Receives failed invocations. The bus itself never retries; a sink may
/// persist letters for an external replay or alerting process.
pub trait DeadLetterSink: Send + Sync {
    fn record(&self, letter: DeadLetter);
}
