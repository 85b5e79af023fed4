//! S3 backend built on `rust-s3`.
//!
//! Works against AWS (named region, virtual-hosted addressing) and against
//! S3-compatible stores such as MinIO (custom endpoint, usually path-style).
//! Credentials come from configuration when both keys are set, otherwise from
//! the ambient provider chain (environment, profile, instance metadata).

use super::ObjectStoreBackend;
use crate::config::StorageConfig;
use crate::types::{AppError, AppResult};
use async_trait::async_trait;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::region::Region;
use s3::BucketConfiguration;
use tokio::io::AsyncWrite;
use tracing::debug;

pub struct S3Backend {
    region: Region,
    credentials: Credentials,
    path_style: bool,
}

impl S3Backend {
    pub fn new(region: Region, credentials: Credentials, path_style: bool) -> Self {
        Self {
            region,
            credentials,
            path_style,
        }
    }

    pub fn from_config(config: &StorageConfig) -> AppResult<Self> {
        let region = resolve_region(&config.region, config.endpoint.as_deref())?;

        let credentials = match (&config.access_key_id, &config.secret_access_key) {
            (Some(access_key), Some(secret_key)) => Credentials::new(
                Some(access_key.as_str()),
                Some(secret_key.as_str()),
                None,
                config.session_token.as_deref(),
                None,
            ),
            _ => Credentials::default(),
        }
        .map_err(|e| AppError::Config(format!("invalid S3 credentials: {}", e)))?;

        Ok(Self::new(region, credentials, config.path_style))
    }

    fn bucket(&self, name: &str) -> AppResult<Box<Bucket>> {
        let bucket: Box<Bucket> =
            Bucket::new(name, self.region.clone(), self.credentials.clone())?.into();
        if self.path_style {
            Ok(bucket.with_path_style().into())
        } else {
            Ok(bucket)
        }
    }

    fn region_for(&self, location_constraint: &str) -> AppResult<Region> {
        match &self.region {
            Region::Custom { endpoint, .. } => Ok(Region::Custom {
                region: location_constraint.to_string(),
                endpoint: endpoint.clone(),
            }),
            _ => resolve_region(location_constraint, None),
        }
    }
}

/// Named AWS region, or a custom region served from `endpoint`.
pub fn resolve_region(name: &str, endpoint: Option<&str>) -> AppResult<Region> {
    match endpoint {
        Some(endpoint) => Ok(Region::Custom {
            region: name.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }),
        None => name
            .parse()
            .map_err(|e| AppError::Config(format!("invalid region {:?}: {}", name, e))),
    }
}

#[async_trait]
impl ObjectStoreBackend for S3Backend {
    async fn list_buckets(&self) -> AppResult<Vec<String>> {
        let response = Bucket::list_buckets(self.region.clone(), self.credentials.clone()).await?;
        Ok(response.bucket_names().collect())
    }

    async fn create_bucket(&self, name: &str, location_constraint: &str) -> AppResult<()> {
        let region = self.region_for(location_constraint)?;
        let config = BucketConfiguration::default();

        let response = if self.path_style {
            Bucket::create_with_path_style(name, region, self.credentials.clone(), config).await?
        } else {
            Bucket::create(name, region, self.credentials.clone(), config).await?
        };

        if !response.success() {
            return Err(AppError::Backend(format!(
                "create bucket {} failed with status {}: {}",
                name, response.response_code, response.response_text
            )));
        }
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content: &[u8],
        content_type: &str,
    ) -> AppResult<()> {
        let response = self
            .bucket(bucket)?
            .put_object_with_content_type(key, content, content_type)
            .await?;
        debug!(bucket, key, status = response.status_code(), "PUT object");
        Ok(())
    }

    async fn list_objects(&self, bucket: &str) -> AppResult<Vec<String>> {
        // `list` follows continuation tokens until the listing is exhausted.
        let pages = self.bucket(bucket)?.list(String::new(), None).await?;
        debug!(bucket, pages = pages.len(), "LIST objects");
        Ok(pages
            .into_iter()
            .flat_map(|page| page.contents)
            .map(|object| object.key)
            .collect())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> AppResult<Vec<u8>> {
        let response = self.bucket(bucket)?.get_object(key).await?;
        debug!(bucket, key, status = response.status_code(), "GET object");
        Ok(response.bytes().to_vec())
    }

    async fn get_object_to_writer(
        &self,
        bucket: &str,
        key: &str,
        mut writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> AppResult<()> {
        let status = self
            .bucket(bucket)?
            .get_object_to_writer(key, &mut writer)
            .await?;
        debug!(bucket, key, status, "GET object (streamed)");
        Ok(())
    }
}
