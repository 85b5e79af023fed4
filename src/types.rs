use s3::error::S3Error;

/// Errors surfaced by the object-store and database clients.
///
/// Provider and I/O failures are wrapped unchanged so callers can still reach
/// the underlying error through `source()`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Storage error: {0}")]
    Storage(#[from] S3Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cannot decode column `{column}` of type {type_name}")]
    Decode { column: String, type_name: String },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type AppResult<T> = std::result::Result<T, AppError>;
