//! Declarative event patterns.
//!
//! A pattern matches an event iff the event's source is in `source`, its
//! detail-type is in `detail-type` (when given), and its detail structurally
//! contains `detail` (when given). Absent fields are wildcards.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use waypoint_common::{DetailType, EntityFamily};

use crate::types::Event;

#[derive(Error, Debug)]
pub enum PatternError {
    #[error("Malformed event pattern: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Event pattern must name at least one source")]
    EmptySource,

    #[error("Event pattern detail must be a JSON object")]
    DetailNotObject,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPattern {
    /// Accepted sources, OR-matched. An empty set matches nothing.
    #[serde(default)]
    pub source: Vec<String>,
    /// Accepted detail-types, OR-matched. `None` matches any.
    #[serde(rename = "detail-type", default, skip_serializing_if = "Option::is_none")]
    pub detail_type: Option<Vec<String>>,
    /// Structural sub-match against the event detail. `None` matches any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl EventPattern {
    /// Pattern over the given sources with no further constraints.
    pub fn sources<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            source: sources.into_iter().map(Into::into).collect(),
            detail_type: None,
            detail: None,
        }
    }

    /// Pattern over pipeline families.
    pub fn families(families: &[EntityFamily]) -> Self {
        Self::sources(families.iter().map(|f| f.as_str()))
    }

    pub fn detail_types<I, S>(mut self, detail_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.detail_type = Some(detail_types.into_iter().map(Into::into).collect());
        self
    }

    pub fn detail_type(self, detail_type: DetailType) -> Self {
        self.detail_types([detail_type.as_str()])
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Parse a pattern from its JSON rule form.
    pub fn from_json(raw: &str) -> Result<Self, PatternError> {
        let pattern: EventPattern = serde_json::from_str(raw)?;
        pattern.validate()?;
        Ok(pattern)
    }

    pub fn validate(&self) -> Result<(), PatternError> {
        if self.source.is_empty() {
            return Err(PatternError::EmptySource);
        }
        if let Some(detail) = &self.detail {
            if !detail.is_object() {
                return Err(PatternError::DetailNotObject);
            }
        }
        Ok(())
    }

    pub fn matches(&self, event: &Event) -> bool {
        if !self.source.iter().any(|s| *s == event.source) {
            return false;
        }
        if let Some(detail_types) = &self.detail_type {
            if !detail_types.iter().any(|t| *t == event.detail_type) {
                return false;
            }
        }
        match &self.detail {
            Some(pattern) => detail_matches(pattern, &event.detail),
            None => true,
        }
    }
}

/// Recursive structural match of `pattern` against `actual`.
///
/// - object: every pattern field must exist in `actual` and match recursively
/// - array: the allowed values; matches if `actual` equals one of them, or if
///   `actual` is an array containing one of them
/// - scalar: equality, or containment when `actual` is an array
pub fn detail_matches(pattern: &Value, actual: &Value) -> bool {
    match pattern {
        Value::Object(fields) => match actual {
            Value::Object(actual_fields) => fields.iter().all(|(key, sub)| {
                actual_fields
                    .get(key)
                    .is_some_and(|value| detail_matches(sub, value))
            }),
            _ => false,
        },
        Value::Array(allowed) => match actual {
            Value::Array(items) => items.iter().any(|item| allowed.contains(item)),
            other => allowed.contains(other),
        },
        scalar => match actual {
            Value::Array(items) => items.contains(scalar),
            other => other == scalar,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_object_requires_every_path() {
        let pattern = json!({"products": {"pudo": ["operational"]}});
        assert!(detail_matches(
            &pattern,
            &json!({"id": "L1", "products": {"pudo": "operational", "lockers": 4}})
        ));
        assert!(!detail_matches(&pattern, &json!({"products": {"pudo": "closed"}})));
        assert!(!detail_matches(&pattern, &json!({"products": {}})));
        assert!(!detail_matches(&pattern, &json!({"products": "pudo"})));
    }

    #[test]
    fn array_field_in_event_is_containment() {
        let pattern = json!({"tags": ["depot"]});
        assert!(detail_matches(&pattern, &json!({"tags": ["hub", "depot"]})));
        assert!(!detail_matches(&pattern, &json!({"tags": ["hub"]})));
    }

    #[test]
    fn scalar_pattern_is_equality_or_containment() {
        assert!(detail_matches(&json!({"n": 3}), &json!({"n": 3})));
        assert!(detail_matches(&json!({"n": 3}), &json!({"n": [1, 3]})));
        assert!(!detail_matches(&json!({"n": 3}), &json!({"n": "3"})));
    }

    #[test]
    fn empty_allowed_set_matches_nothing() {
        assert!(!detail_matches(&json!({"state": []}), &json!({"state": "open"})));
    }
}
