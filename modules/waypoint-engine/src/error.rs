use thiserror::Error;
use waypoint_events::PatternError;

#[derive(Error, Debug)]
pub enum BusError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("Rule registry lock poisoned")]
    Poisoned,
}
