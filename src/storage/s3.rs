use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

use crate::error::{Result, DubError};
use super::ObjectStore;

/// S3-backed object store
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(&self, bucket: &str, key: &str, local_path: &Path) -> Result<()> {
        if !local_path.exists() {
            return Err(DubError::FileNotFound(local_path.display().to_string()));
        }
        info!("Uploading {} to s3://{}/{}", local_path.display(), bucket, key);

        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| DubError::Storage(format!("Failed to read {}: {}", local_path.display(), e)))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| DubError::aws("s3", DisplayErrorContext(e)))?;

        Ok(())
    }

    async fn download(&self, bucket: &str, key: &str, local_path: &Path) -> Result<()> {
        info!("Downloading s3://{}/{} to {}", bucket, key, local_path.display());

        let bytes = self.get_bytes(bucket, key).await?;
        if let Some(parent) = local_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        fs::write(local_path, bytes).await?;

        Ok(())
    }

    async fn get_bytes(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let output = self.client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| DubError::aws("s3", DisplayErrorContext(e)))?;

        let data = output.body
            .collect()
            .await
            .map_err(|e| DubError::Storage(format!("Failed to read s3://{}/{}: {}", bucket, key, e)))?;

        let bytes = data.into_bytes().to_vec();
        debug!("Fetched {} bytes from s3://{}/{}", bytes.len(), bucket, key);
        Ok(bytes)
    }

    async fn list_buckets(&self) -> Result<Vec<String>> {
        let output = self.client
            .list_buckets()
            .send()
            .await
            .map_err(|e| DubError::aws("s3", DisplayErrorContext(e)))?;

        Ok(output
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(str::to_string))
            .collect())
    }
}
