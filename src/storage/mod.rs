// Object storage layer (S3-compatible)

use crate::config::StorageConfig;
use crate::tabular::{self, Table};
use crate::types::{AppError, AppResult};
use async_trait::async_trait;
use std::path::Path;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

pub mod s3_client;

pub use s3_client::*;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Raw operations of an object store. One implementation per provider.
#[async_trait]
pub trait ObjectStoreBackend: Send + Sync {
    async fn list_buckets(&self) -> AppResult<Vec<String>>;

    async fn create_bucket(&self, name: &str, location_constraint: &str) -> AppResult<()>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content: &[u8],
        content_type: &str,
    ) -> AppResult<()>;

    /// Keys of every object in `bucket`. An empty bucket yields an empty vector.
    async fn list_objects(&self, bucket: &str) -> AppResult<Vec<String>>;

    async fn get_object(&self, bucket: &str, key: &str) -> AppResult<Vec<u8>>;

    async fn get_object_to_writer(
        &self,
        bucket: &str,
        key: &str,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> AppResult<()>;
}

/// Region-scoped façade over an object store.
///
/// The region is fixed at construction and used as the location constraint
/// of every bucket this client creates.
pub struct ObjectStoreClient {
    backend: Box<dyn ObjectStoreBackend>,
    region: String,
}

impl ObjectStoreClient {
    pub fn new(backend: Box<dyn ObjectStoreBackend>, region: impl Into<String>) -> Self {
        Self {
            backend,
            region: region.into(),
        }
    }

    /// Client backed by S3, configured from `config`.
    pub fn from_config(config: &StorageConfig) -> AppResult<Self> {
        let backend = S3Backend::from_config(config)?;
        Ok(Self::new(Box::new(backend), config.region.clone()))
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub async fn list_buckets(&self) -> AppResult<Vec<String>> {
        debug!(region = %self.region, "Listing buckets");
        self.backend.list_buckets().await
    }

    pub async fn create_bucket(&self, name: &str) -> AppResult<()> {
        debug!(bucket = name, region = %self.region, "Creating bucket");
        self.backend.create_bucket(name, &self.region).await?;
        info!(bucket = name, region = %self.region, "Bucket created");
        Ok(())
    }

    /// Uploads the file at `local_path`, stored as `object_name` or, when
    /// omitted, as the file's base name.
    pub async fn upload_file(
        &self,
        local_path: impl AsRef<Path>,
        bucket: &str,
        object_name: Option<&str>,
    ) -> AppResult<String> {
        let local_path = local_path.as_ref();
        let key = match object_name {
            Some(name) => name.to_string(),
            None => default_object_name(local_path)?,
        };

        let content = tokio::fs::read(local_path).await?;
        let content_type = mime_guess::from_path(&key)
            .first_raw()
            .unwrap_or(DEFAULT_CONTENT_TYPE);

        debug!(
            path = %local_path.display(),
            bucket,
            key = %key,
            size = content.len(),
            "Uploading file"
        );
        self.backend
            .put_object(bucket, &key, &content, content_type)
            .await?;
        info!(bucket, key = %key, "File uploaded");
        Ok(key)
    }

    pub async fn list_objects(&self, bucket: &str) -> AppResult<Vec<String>> {
        debug!(bucket, "Listing objects");
        self.backend.list_objects(bucket).await
    }

    /// Streams `object_key` into `local_path`, creating or truncating the file.
    pub async fn download_object(
        &self,
        object_key: &str,
        bucket: &str,
        local_path: impl AsRef<Path>,
    ) -> AppResult<()> {
        let local_path = local_path.as_ref();
        debug!(bucket, key = object_key, path = %local_path.display(), "Downloading object");

        let mut file = tokio::fs::File::create(local_path).await?;
        self.backend
            .get_object_to_writer(bucket, object_key, &mut file)
            .await?;
        file.flush().await?;
        file.sync_all().await?;

        info!(bucket, key = object_key, path = %local_path.display(), "Object downloaded");
        Ok(())
    }

    /// Reads an object fully into memory and parses its first sheet.
    ///
    /// Keys ending in `.csv` are parsed as CSV, anything else as a workbook.
    pub async fn read_spreadsheet_object(&self, bucket: &str, object_key: &str) -> AppResult<Table> {
        debug!(bucket, key = object_key, "Reading spreadsheet object");
        let bytes = self.backend.get_object(bucket, object_key).await?;

        if is_csv_key(object_key) {
            tabular::read_csv(&bytes)
        } else {
            tabular::read_spreadsheet(bytes)
        }
    }
}

/// Base name of `path`, used as the object key when none is given.
pub fn default_object_name(path: &Path) -> AppResult<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            AppError::InvalidRequest(format!("{} has no usable file name", path.display()))
        })
}

fn is_csv_key(key: &str) -> bool {
    Path::new(key)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}
