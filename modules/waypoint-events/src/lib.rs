//! Event envelope and declarative routing patterns.
//!
//! Events are opaque JSON facts tagged with a `source` and `detail-type`.
//! Patterns select events by those tags and by a structural sub-match on the
//! detail. Matching is pure; dispatch lives in the engine.

pub mod pattern;
pub mod types;

pub use pattern::{detail_matches, EventPattern, PatternError};
pub use types::{EnvelopeError, Event};
