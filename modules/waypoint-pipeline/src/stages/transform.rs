//! Update → Transformed. Reshapes a raw producer payload into the canonical
//! `Location` the loader expects. Pure: the same input always yields the
//! same canonical detail.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;
use waypoint_common::{DetailType, EntityFamily};
use waypoint_engine::Handler;
use waypoint_events::Event;

use crate::entities::{GeoPoint, Location};
use crate::error::TransformError;

/// Producer field spellings accepted for each canonical slot.
const ID_FIELDS: &[&str] = &["id"];
const NAME_FIELDS: &[&str] = &["name"];
const GROUP_FIELDS: &[&str] = &["group", "parentId"];
const LAT_FIELDS: &[&str] = &["lat", "latitude"];
const LNG_FIELDS: &[&str] = &["lng", "lon", "longitude"];
const POSITION_FIELD: &str = "position";

pub struct TransformStage;

#[async_trait]
impl Handler for TransformStage {
    fn name(&self) -> &str {
        "transform"
    }

    async fn handle(&self, event: &Event) -> Result<Vec<Event>> {
        let location = transform_location(&event.detail)?;
        debug!(id = location.id.as_str(), "Transformed location update");

        let detail = serde_json::to_value(&location)?;
        Ok(vec![Event::of(
            EntityFamily::Location,
            DetailType::Transformed,
            detail,
        )])
    }
}

/// Reshape an Update detail into a canonical `Location`.
pub fn transform_location(detail: &Value) -> Result<Location, TransformError> {
    let Value::Object(fields) = detail else {
        return Err(TransformError::NotAnObject);
    };

    let id = match first(fields, ID_FIELDS) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) if n.is_u64() || n.is_i64() => n.to_string(),
        _ => return Err(TransformError::MissingId),
    };

    let name = optional_string(fields, NAME_FIELDS, "name")?;
    let group = optional_string(fields, GROUP_FIELDS, "group")?;
    let position = position(fields)?;

    let consumed = |key: &str| {
        ID_FIELDS
            .iter()
            .chain(NAME_FIELDS)
            .chain(GROUP_FIELDS)
            .chain(LAT_FIELDS)
            .chain(LNG_FIELDS)
            .any(|f| *f == key)
            || key == POSITION_FIELD
    };
    let attributes: Map<String, Value> = fields
        .iter()
        .filter(|(k, _)| !consumed(k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Ok(Location {
        id,
        name,
        group,
        position,
        attributes,
    })
}

fn first<'a>(fields: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|n| fields.get(*n))
        .find(|v| !v.is_null())
}

fn optional_string(
    fields: &Map<String, Value>,
    names: &[&str],
    field: &'static str,
) -> Result<Option<String>, TransformError> {
    match first(fields, names) {
        None => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(_) => Err(TransformError::InvalidField {
            field,
            expected: "a string",
        }),
    }
}

fn position(fields: &Map<String, Value>) -> Result<Option<GeoPoint>, TransformError> {
    let (lat, lng) = match fields.get(POSITION_FIELD).filter(|v| !v.is_null()) {
        Some(Value::Object(nested)) => (first(nested, LAT_FIELDS), first(nested, LNG_FIELDS)),
        Some(_) => {
            return Err(TransformError::InvalidField {
                field: "position",
                expected: "an object",
            })
        }
        None => (first(fields, LAT_FIELDS), first(fields, LNG_FIELDS)),
    };

    let (lat, lng) = match (lat, lng) {
        (None, None) => return Ok(None),
        (Some(lat), Some(lng)) => (coordinate(lat, "lat")?, coordinate(lng, "lng")?),
        _ => {
            return Err(TransformError::InvalidCoordinates(
                "latitude and longitude must be given together".into(),
            ))
        }
    };

    if !(-90.0..=90.0).contains(&lat) {
        return Err(TransformError::InvalidCoordinates(format!(
            "latitude {lat} out of range"
        )));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(TransformError::InvalidCoordinates(format!(
            "longitude {lng} out of range"
        )));
    }

    Ok(Some(GeoPoint { lat, lng }))
}

fn coordinate(value: &Value, field: &'static str) -> Result<f64, TransformError> {
    value
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or(TransformError::InvalidField {
            field,
            expected: "a number",
        })
}
