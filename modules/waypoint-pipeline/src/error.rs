use thiserror::Error;
use waypoint_store::StoreError;

/// Unshapeable Update payload. The event is dropped, never retried.
#[derive(Error, Debug, PartialEq)]
pub enum TransformError {
    #[error("Update detail must be a JSON object")]
    NotAnObject,

    #[error("Update detail has no usable 'id'")]
    MissingId,

    #[error("Field '{field}' must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },

    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),
}

/// Load failure. Surfaced to the bus; the stage performs no retry.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Transformed detail is not a valid {family} entity: {source}")]
    InvalidPayload {
        family: &'static str,
        source: serde_json::Error,
    },

    #[error("Geohash bucketing failed: {0}")]
    Geohash(String),

    #[error("Store write failed: {0}")]
    Store(#[from] StoreError),
}

/// Read or delivery failure. Non-fatal: the loaded record stands.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Loaded detail has no 'id'")]
    MissingId,

    #[error("Store read failed: {0}")]
    Read(#[from] StoreError),

    #[error("Loaded record {0} not found")]
    RecordMissing(String),

    #[error("Stored record is not a valid entity: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Connection registry lookup failed: {0}")]
    Registry(String),

    #[error("Delivery failed for {failed} of {attempted} connections")]
    Delivery { failed: usize, attempted: usize },
}
