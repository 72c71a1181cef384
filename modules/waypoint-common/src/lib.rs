pub mod config;
pub mod error;
pub mod families;

pub use config::{Config, LogFormat};
pub use error::WaypointError;
pub use families::{DetailType, EntityFamily};
