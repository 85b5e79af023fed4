// s3-rds-connector - ad-hoc retrieval from S3-compatible object stores and managed MySQL

pub mod config;
pub mod db;
pub mod storage;
pub mod tabular;
pub mod types;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use db::{DatabaseClient, QueryExecutor, QueryResult, Session};
pub use storage::{ObjectStoreBackend, ObjectStoreClient, S3Backend};
pub use tabular::Table;
pub use types::{AppError, AppResult};
