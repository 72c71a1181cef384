//! The event envelope. This is the wire contract between producers and stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use waypoint_common::{DetailType, EntityFamily};

#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("Malformed event envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Event field '{0}' must not be empty")]
    EmptyField(&'static str),

    #[error("Event detail must be a JSON object")]
    DetailNotObject,
}

/// A published fact. Never mutated after publish.
///
/// Serialized form:
/// `{"id": .., "source": .., "detail-type": .., "detail": {..}, "time": ..}`.
/// Only `source`, `detail-type` and `detail` are required on the wire; `id`
/// and `time` are assigned on parse when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub source: String,
    #[serde(rename = "detail-type")]
    pub detail_type: String,
    pub detail: serde_json::Value,
    #[serde(default = "Utc::now")]
    pub time: DateTime<Utc>,
    /// Id of the event whose handler emitted this one. Root events have none.
    #[serde(default, rename = "caused-by", skip_serializing_if = "Option::is_none")]
    pub caused_by: Option<Uuid>,
}

impl Event {
    /// Create a root event stamped with a fresh id and the current time.
    pub fn new(
        source: impl Into<String>,
        detail_type: impl Into<String>,
        detail: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            detail_type: detail_type.into(),
            detail,
            time: Utc::now(),
            caused_by: None,
        }
    }

    /// Shorthand for the pipeline's own vocabulary.
    pub fn of(family: EntityFamily, detail_type: DetailType, detail: serde_json::Value) -> Self {
        Self::new(family.as_str(), detail_type.as_str(), detail)
    }

    pub fn caused_by(mut self, parent: Uuid) -> Self {
        self.caused_by = Some(parent);
        self
    }

    /// Parse and validate an envelope received from a producer.
    pub fn from_wire(raw: &str) -> Result<Self, EnvelopeError> {
        let event: Event = serde_json::from_str(raw)?;
        event.validate()?;
        Ok(event)
    }

    pub fn to_wire(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Enforce the envelope invariants that serde alone cannot express.
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        if self.source.is_empty() {
            return Err(EnvelopeError::EmptyField("source"));
        }
        if self.detail_type.is_empty() {
            return Err(EnvelopeError::EmptyField("detail-type"));
        }
        if !self.detail.is_object() {
            return Err(EnvelopeError::DetailNotObject);
        }
        Ok(())
    }

    /// Whether this event is `family`/`detail_type` in the pipeline vocabulary.
    pub fn is(&self, family: EntityFamily, detail_type: DetailType) -> bool {
        self.source == family.as_str() && self.detail_type == detail_type.as_str()
    }

    /// String field from the top level of the detail, if present.
    pub fn detail_str(&self, field: &str) -> Option<&str> {
        self.detail.get(field).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_form_uses_hyphenated_detail_type() {
        let event = Event::new("Location", "Update", json!({"id": "L1"}));
        let wire = event.to_wire().unwrap();
        assert!(wire.contains("\"detail-type\":\"Update\""));
        assert!(!wire.contains("caused-by"));
    }

    #[test]
    fn from_wire_fills_id_and_time() {
        let event =
            Event::from_wire(r#"{"source":"Location","detail-type":"Update","detail":{"id":"L1"}}"#)
                .unwrap();
        assert_eq!(event.source, "Location");
        assert_eq!(event.detail_type, "Update");
        assert_eq!(event.detail_str("id"), Some("L1"));
        assert!(event.caused_by.is_none());
    }

    #[test]
    fn from_wire_rejects_missing_detail_type() {
        let err = Event::from_wire(r#"{"source":"Location","detail":{}}"#).unwrap_err();
        assert!(matches!(err, EnvelopeError::Malformed(_)));
    }

    #[test]
    fn from_wire_rejects_non_object_detail() {
        let err = Event::from_wire(r#"{"source":"Location","detail-type":"Update","detail":[1]}"#)
            .unwrap_err();
        assert!(matches!(err, EnvelopeError::DetailNotObject));
    }

    #[test]
    fn from_wire_rejects_empty_source() {
        let err = Event::from_wire(r#"{"source":"","detail-type":"Update","detail":{}}"#)
            .unwrap_err();
        assert!(matches!(err, EnvelopeError::EmptyField("source")));
    }

    #[test]
    fn vocabulary_check() {
        let event = Event::of(EntityFamily::Ws, DetailType::Transformed, json!({}));
        assert_eq!(event.source, "WS");
        assert!(event.is(EntityFamily::Ws, DetailType::Transformed));
        assert!(!event.is(EntityFamily::Location, DetailType::Transformed));
    }
}
