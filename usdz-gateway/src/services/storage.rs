use crate::config::StorageConfig;
use async_trait::async_trait;
use opendal::{services::Gcs, Operator};
use service_core::error::AppError;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Object storage operations needed by the cloud conversion flow.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Copy `object` from the bucket to `dest` on local disk.
    async fn download(&self, object: &str, dest: &Path) -> Result<(), AppError>;

    /// Copy the local file at `src` into the bucket as `object`.
    async fn upload(&self, src: &Path, object: &str) -> Result<(), AppError>;

    /// Credential-free read URL for `object`, valid for `ttl`.
    async fn signed_url(&self, object: &str, ttl: Duration) -> Result<String, AppError>;
}

/// Bytes moved per bucket request, so a large model is never held in memory
/// whole.
const TRANSFER_CHUNK_BYTES: usize = 8 * 1024 * 1024;

/// Google Cloud Storage bucket accessed through OpenDAL.
pub struct GcsStorage {
    operator: Operator,
    bucket: String,
    chunk_bytes: usize,
}

impl GcsStorage {
    /// Returns `Ok(None)` when no bucket is configured.
    pub fn from_config(config: &StorageConfig) -> Result<Option<Self>, AppError> {
        let Some(bucket) = config.gcs_bucket.as_deref() else {
            return Ok(None);
        };

        let mut builder = Gcs::default().bucket(bucket).root("/");
        if let Some(path) = config.gcs_credential_path.as_deref() {
            builder = builder.credential_path(path);
        }

        let operator = Operator::new(builder)
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!(
                    "Failed to initialize GCS client for bucket '{}': {}",
                    bucket,
                    e
                ))
            })?
            .finish();

        tracing::info!(bucket = %bucket, "GCS storage initialized");

        Ok(Some(Self::with_operator(operator, bucket, TRANSFER_CHUNK_BYTES)))
    }

    fn with_operator(operator: Operator, bucket: &str, chunk_bytes: usize) -> Self {
        Self {
            operator,
            bucket: bucket.to_string(),
            chunk_bytes: chunk_bytes.max(1),
        }
    }

    fn storage_error(&self, action: &str, object: &str, e: opendal::Error) -> AppError {
        AppError::InternalError(anyhow::anyhow!(
            "GCS {} of gs://{}/{} failed: {}",
            action,
            self.bucket,
            object,
            e
        ))
    }
}

#[async_trait]
impl Storage for GcsStorage {
    async fn download(&self, object: &str, dest: &Path) -> Result<(), AppError> {
        let size = self
            .operator
            .stat(object)
            .await
            .map_err(|e| self.storage_error("download", object, e))?
            .content_length();
        let reader = self
            .operator
            .reader(object)
            .await
            .map_err(|e| self.storage_error("download", object, e))?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::File::create(dest).await?;

        let mut offset = 0u64;
        while offset < size {
            let end = size.min(offset + self.chunk_bytes as u64);
            let chunk = reader
                .read(offset..end)
                .await
                .map_err(|e| self.storage_error("download", object, e))?;
            file.write_all(&chunk.to_bytes()).await?;
            offset = end;
        }
        file.flush().await?;

        tracing::debug!(bucket = %self.bucket, object = %object, dest = %dest.display(), size, "Downloaded object");
        Ok(())
    }

    async fn upload(&self, src: &Path, object: &str) -> Result<(), AppError> {
        let mut file = fs::File::open(src).await?;
        let mut writer = self
            .operator
            .writer(object)
            .await
            .map_err(|e| self.storage_error("upload", object, e))?;

        let mut size = 0usize;
        let mut buf = vec![0u8; self.chunk_bytes];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            writer
                .write(buf[..n].to_vec())
                .await
                .map_err(|e| self.storage_error("upload", object, e))?;
            size += n;
        }
        writer
            .close()
            .await
            .map_err(|e| self.storage_error("upload", object, e))?;

        tracing::debug!(bucket = %self.bucket, object = %object, size, "Uploaded object");
        Ok(())
    }

    async fn signed_url(&self, object: &str, ttl: Duration) -> Result<String, AppError> {
        let request = self.operator.presign_read(object, ttl).await.map_err(|e| {
            AppError::InternalError(anyhow::anyhow!(
                "Failed to sign URL for gs://{}/{}: {}",
                self.bucket,
                object,
                e
            ))
        })?;

        Ok(request.uri().to_string())
    }
}
