//! Entry points that turn inbound requests into pipeline events.
//!
//! Transport termination (HTTP, WebSocket) lives outside this crate; these
//! functions take the already-decoded request and publish on the bus.

use serde_json::Value;
use tracing::info;
use uuid::Uuid;
use waypoint_common::{DetailType, EntityFamily, WaypointError};
use waypoint_engine::EventBus;
use waypoint_events::Event;

use crate::entities::{Connection, ConnectionStatus};

/// A location update posted by a producer. The body is passed through as
/// the Update detail; reshaping is the Transform stage's job.
pub fn post_location(bus: &EventBus, body: Value) -> Result<Uuid, WaypointError> {
    if !body.is_object() {
        return Err(WaypointError::Validation(
            "location body must be a JSON object".into(),
        ));
    }
    let event = Event::of(EntityFamily::Location, DetailType::Update, body);
    let id = event.id;
    bus.publish(event);
    Ok(id)
}

/// A websocket client connected. `watch` narrows notifications to one location.
pub fn ws_connected(
    bus: &EventBus,
    connection_id: &str,
    endpoint: Option<String>,
    watch: Option<String>,
) -> Result<Uuid, WaypointError> {
    publish_connection(
        bus,
        Connection {
            connection_id: connection_id.to_string(),
            status: ConnectionStatus::Connected,
            endpoint,
            watch,
        },
    )
}

/// A websocket client went away. Recorded as a status change, not a delete.
pub fn ws_disconnected(bus: &EventBus, connection_id: &str) -> Result<Uuid, WaypointError> {
    publish_connection(
        bus,
        Connection {
            connection_id: connection_id.to_string(),
            status: ConnectionStatus::Disconnected,
            endpoint: None,
            watch: None,
        },
    )
}

fn publish_connection(bus: &EventBus, connection: Connection) -> Result<Uuid, WaypointError> {
    if connection.connection_id.trim().is_empty() {
        return Err(WaypointError::Validation("connection id must not be empty".into()));
    }
    let detail = serde_json::to_value(&connection).map_err(anyhow::Error::from)?;
    let event = Event::of(EntityFamily::Ws, DetailType::Transformed, detail);
    let id = event.id;
    info!(
        connection_id = connection.connection_id.as_str(),
        connected = connection.is_connected(),
        "Connection state published"
    );
    bus.publish(event);
    Ok(id)
}
