use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    #[error("Store lock poisoned")]
    Poisoned,
}
