//! Record and key types. Backend-agnostic.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;

/// Primary address of a record. `(hk, sk)` is globally unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrimaryKey {
    #[serde(rename = "HK")]
    pub hk: String,
    #[serde(rename = "SK")]
    pub sk: String,
}

impl PrimaryKey {
    pub fn new(hk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            hk: hk.into(),
            sk: sk.into(),
        }
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.hk, self.sk)
    }
}

/// A stored row: an entity or a relationship edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "HK")]
    pub hk: String,
    #[serde(rename = "SK")]
    pub sk: String,
    #[serde(rename = "K1SK", default, skip_serializing_if = "Option::is_none")]
    pub k1sk: Option<String>,
    #[serde(rename = "K2SK", default, skip_serializing_if = "Option::is_none")]
    pub k2sk: Option<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl Record {
    pub fn new(key: PrimaryKey) -> Self {
        Self {
            hk: key.hk,
            sk: key.sk,
            k1sk: None,
            k2sk: None,
            attributes: Map::new(),
        }
    }

    pub fn with_k1(mut self, k1sk: Option<String>) -> Self {
        self.k1sk = k1sk;
        self
    }

    pub fn with_k2(mut self, k2sk: Option<String>) -> Self {
        self.k2sk = k2sk;
        self
    }

    pub fn with_attributes(mut self, attributes: Map<String, Value>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn key(&self) -> PrimaryKey {
        PrimaryKey::new(self.hk.clone(), self.sk.clone())
    }

    /// Key attributes must be non-empty; an empty related key is written as absent.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.hk.is_empty() {
            return Err(StoreError::InvalidRecord("HK must not be empty".into()));
        }
        if self.sk.is_empty() {
            return Err(StoreError::InvalidRecord("SK must not be empty".into()));
        }
        if self.k1sk.as_deref() == Some("") || self.k2sk.as_deref() == Some("") {
            return Err(StoreError::InvalidRecord(
                "K1SK/K2SK must be absent rather than empty".into(),
            ));
        }
        Ok(())
    }

    /// The `(partition, sort)` entry this record contributes to `index`, if any.
    pub fn index_entry(&self, index: KeyIndex) -> Option<(&str, &str)> {
        match index {
            KeyIndex::K1Sk => self.k1sk.as_deref().map(|k| (k, self.sk.as_str())),
            KeyIndex::K2Sk => self.k2sk.as_deref().map(|k| (k, self.sk.as_str())),
            KeyIndex::K1Hk => self.k1sk.as_deref().map(|k| (k, self.hk.as_str())),
            KeyIndex::K2Hk => self.k2sk.as_deref().map(|k| (k, self.hk.as_str())),
            KeyIndex::SkHk => Some((self.sk.as_str(), self.hk.as_str())),
        }
    }

    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(|v| v.as_str())
    }
}

/// The five secondary access paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyIndex {
    /// Partition `K1SK`, ordered by `SK`.
    K1Sk,
    /// Partition `K2SK`, ordered by `SK`.
    K2Sk,
    /// Partition `K1SK`, ordered by `HK`.
    K1Hk,
    /// Partition `K2SK`, ordered by `HK`.
    K2Hk,
    /// Partition `SK`, ordered by `HK` (reverse lookup).
    SkHk,
}

impl KeyIndex {
    pub const ALL: [KeyIndex; 5] = [
        KeyIndex::K1Sk,
        KeyIndex::K2Sk,
        KeyIndex::K1Hk,
        KeyIndex::K2Hk,
        KeyIndex::SkHk,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            KeyIndex::K1Sk => "K1SK",
            KeyIndex::K2Sk => "K2SK",
            KeyIndex::K1Hk => "K1HK",
            KeyIndex::K2Hk => "K2HK",
            KeyIndex::SkHk => "SKHK",
        }
    }

    /// Column holding the partition value.
    pub(crate) fn partition_column(&self) -> &'static str {
        match self {
            KeyIndex::K1Sk | KeyIndex::K1Hk => "k1sk",
            KeyIndex::K2Sk | KeyIndex::K2Hk => "k2sk",
            KeyIndex::SkHk => "sk",
        }
    }

    /// Column holding the sort value.
    pub(crate) fn sort_column(&self) -> &'static str {
        match self {
            KeyIndex::K1Sk | KeyIndex::K2Sk => "sk",
            KeyIndex::K1Hk | KeyIndex::K2Hk | KeyIndex::SkHk => "hk",
        }
    }

    /// The primary-key column not used as partition or sort. Tie-breaker.
    pub(crate) fn tiebreak_column(&self) -> &'static str {
        match self.sort_column() {
            "sk" => "hk",
            _ => "sk",
        }
    }
}

impl fmt::Display for KeyIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Condition on an index's sort attribute.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SortRange {
    #[default]
    All,
    Eq(String),
    BeginsWith(String),
    /// Inclusive on both ends.
    Between(String, String),
}

impl SortRange {
    pub fn contains(&self, value: &str) -> bool {
        match self {
            SortRange::All => true,
            SortRange::Eq(v) => value == v.as_str(),
            SortRange::BeginsWith(prefix) => value.starts_with(prefix.as_str()),
            SortRange::Between(lo, hi) => value >= lo.as_str() && value <= hi.as_str(),
        }
    }
}
