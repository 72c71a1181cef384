use thiserror::Error;

#[derive(Error, Debug)]
pub enum WaypointError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown entity family: {0}")]
    UnknownFamily(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
