//! Canonical entities and their key layout in the multi-index table.
//!
//! ```text
//! entity      HK                 SK           K1SK            K2SK
//! Location    LOCATION#<id>      META         GROUP#<group>   GEO#<geohash>
//! Connection  WS#<connectionId>  CONNECTION   WS#CONNECTED    LOCATION#<watched id>
//! ```
//!
//! Related keys are absent when the entity has no such relation. Stored
//! attributes are derived from the entity alone, so replaying the same
//! Transformed payload rewrites an identical record.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use waypoint_common::{Config, EntityFamily};
use waypoint_store::{PrimaryKey, Record};

use crate::error::LoadError;

pub const LOCATION_PREFIX: &str = "LOCATION#";
pub const GROUP_PREFIX: &str = "GROUP#";
pub const GEO_PREFIX: &str = "GEO#";
pub const CONNECTION_PREFIX: &str = "WS#";
pub const META_SK: &str = "META";
pub const CONNECTION_SK: &str = "CONNECTION";
pub const CONNECTED_K1: &str = "WS#CONNECTED";

/// Attribute naming the entity family on every stored record.
pub const ENTITY_ATTR: &str = "entity";

/// Parameters of the key layout that come from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyLayout {
    pub geo_precision: usize,
}

impl Default for KeyLayout {
    fn default() -> Self {
        Self { geo_precision: 5 }
    }
}

impl KeyLayout {
    pub fn from_config(config: &Config) -> Self {
        Self {
            geo_precision: config.geo_precision,
        }
    }

    pub fn geo_bucket(&self, point: &GeoPoint) -> Result<String, LoadError> {
        geohash::encode(
            geohash::Coord {
                x: point.lng,
                y: point.lat,
            },
            self.geo_precision,
        )
        .map(|hash| format!("{GEO_PREFIX}{hash}"))
        .map_err(|e| LoadError::Geohash(e.to_string()))
    }
}

/// An entity family the Load stage can persist.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    const FAMILY: EntityFamily;

    fn id(&self) -> &str;

    fn key(&self) -> PrimaryKey;

    /// `(K1SK, K2SK)` for this entity.
    fn related_keys(&self, layout: &KeyLayout) -> Result<(Option<String>, Option<String>), LoadError>;

    fn to_record(&self, layout: &KeyLayout) -> Result<Record, LoadError> {
        let (k1sk, k2sk) = self.related_keys(layout)?;
        let mut attributes = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(source) => {
                return Err(LoadError::InvalidPayload {
                    family: Self::FAMILY.as_str(),
                    source,
                })
            }
        };
        attributes.insert(ENTITY_ATTR.into(), Value::String(Self::FAMILY.as_str().into()));

        Ok(Record::new(self.key())
            .with_k1(k1sk)
            .with_k2(k2sk)
            .with_attributes(attributes))
    }

    fn from_record(record: &Record) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(record.attributes.clone()))
    }
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Parent grouping, e.g. the depot network a location belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<GeoPoint>,
    /// Producer fields with no canonical slot, carried through untouched.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

pub fn location_key(id: &str) -> PrimaryKey {
    PrimaryKey::new(format!("{LOCATION_PREFIX}{id}"), META_SK)
}

impl Entity for Location {
    const FAMILY: EntityFamily = EntityFamily::Location;

    fn id(&self) -> &str {
        &self.id
    }

    fn key(&self) -> PrimaryKey {
        location_key(&self.id)
    }

    fn related_keys(&self, layout: &KeyLayout) -> Result<(Option<String>, Option<String>), LoadError> {
        let group = self.group.as_ref().map(|g| format!("{GROUP_PREFIX}{g}"));
        let bucket = self.position.as_ref().map(|p| layout.geo_bucket(p)).transpose()?;
        Ok((group, bucket))
    }
}

// ---------------------------------------------------------------------------
// Connection (WS family)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub connection_id: String,
    pub status: ConnectionStatus,
    /// Delivery metadata: where pushes for this connection are sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Location id this connection watches; `None` receives every location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watch: Option<String>,
}

impl Connection {
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// Whether a notification about `location_id` should reach this connection.
    pub fn wants(&self, location_id: &str) -> bool {
        self.is_connected() && self.watch.as_deref().map_or(true, |w| w == location_id)
    }
}

pub fn connection_key(connection_id: &str) -> PrimaryKey {
    PrimaryKey::new(format!("{CONNECTION_PREFIX}{connection_id}"), CONNECTION_SK)
}

impl Entity for Connection {
    const FAMILY: EntityFamily = EntityFamily::Ws;

    fn id(&self) -> &str {
        &self.connection_id
    }

    fn key(&self) -> PrimaryKey {
        connection_key(&self.connection_id)
    }

    fn related_keys(&self, _layout: &KeyLayout) -> Result<(Option<String>, Option<String>), LoadError> {
        let live = self.is_connected().then(|| CONNECTED_K1.to_string());
        let watch = self.watch.as_ref().map(|id| format!("{LOCATION_PREFIX}{id}"));
        Ok((live, watch))
    }
}
