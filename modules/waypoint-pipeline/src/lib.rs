//! Location/WS event pipeline.
//!
//! transform → load → notify, plus an independent audit observer. Stages are
//! bus handlers selected by the declarative table in `rules`; they share no
//! in-memory state beyond the multi-index `Table`.

pub mod audit;
pub mod delivery;
pub mod entities;
pub mod error;
pub mod producers;
pub mod query;
pub mod registry;
pub mod rules;
pub mod stages;

pub use entities::{Connection, ConnectionStatus, GeoPoint, KeyLayout, Location};
pub use error::{LoadError, NotifyError, TransformError};
pub use rules::{rule_table, Pipeline, PipelineDeps, RuleDef, Stage};
