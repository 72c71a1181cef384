//! Event vocabulary shared by producers, stages and rules.
//!
//! Events on the wire carry plain strings; these enums are the canonical
//! spellings the pipeline publishes and matches on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WaypointError;

/// Entity families routed through the pipeline. Used as the event `source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityFamily {
    #[serde(rename = "Location")]
    Location,
    #[serde(rename = "WS")]
    Ws,
}

impl EntityFamily {
    pub const ALL: [EntityFamily; 2] = [EntityFamily::Location, EntityFamily::Ws];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityFamily::Location => "Location",
            EntityFamily::Ws => "WS",
        }
    }
}

impl fmt::Display for EntityFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityFamily {
    type Err = WaypointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Location" => Ok(EntityFamily::Location),
            "WS" => Ok(EntityFamily::Ws),
            other => Err(WaypointError::UnknownFamily(other.to_string())),
        }
    }
}

/// Stage-transition markers carried in `detail-type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetailType {
    /// Raw producer payload, not yet canonical.
    Update,
    /// Canonical entity payload, ready to load.
    Transformed,
    /// Entity persisted; detail carries only its id.
    Loaded,
}

impl DetailType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetailType::Update => "Update",
            DetailType::Transformed => "Transformed",
            DetailType::Loaded => "Loaded",
        }
    }
}

impl fmt::Display for DetailType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
