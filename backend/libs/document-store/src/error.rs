use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Document store error types
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Document serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Duplicate document: {0}")]
    Duplicate(String),
}
