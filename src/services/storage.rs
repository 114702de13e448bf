use s3::creds::Credentials;
use s3::{Bucket, Region};

/// Signed read URLs are short-lived: the pipeline fetches them immediately.
const SIGNED_URL_EXPIRY_SECS: u32 = 60;

/// Client for the media bucket (S3-compatible object storage).
pub struct MediaStore {
    bucket: Box<Bucket>,
}

impl MediaStore {
    pub fn new(
        bucket_name: &str,
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: "auto".to_string(),
            endpoint: endpoint.to_string(),
        };

        let credentials =
            Credentials::new(Some(access_key), Some(secret_key), None, None, None)
                .map_err(|e| StorageError::Config(e.to_string()))?;

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self { bucket })
    }

    /// Upload image bytes to the media bucket.
    pub async fn upload(&self, key: &str, data: &[u8], content_type: &str) -> Result<(), StorageError> {
        self.bucket
            .put_object_with_content_type(key, data, content_type)
            .await
            .map_err(StorageError::S3)?;
        Ok(())
    }

    /// Presign a 60-second GET URL so callers can fetch bytes directly from
    /// the bucket, bypassing any API-layer proxy.
    pub async fn signed_url(&self, key: &str) -> Result<String, StorageError> {
        self.bucket
            .presign_get(key, SIGNED_URL_EXPIRY_SECS, None)
            .await
            .map_err(StorageError::S3)
    }

    /// Delete an object (test cleanup).
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.bucket.delete_object(key).await.map_err(StorageError::S3)?;
        Ok(())
    }

    /// Check bucket reachability (for health checks).
    pub async fn health_check(&self) -> Result<(), StorageError> {
        self.bucket
            .list("health-probe/".to_string(), Some("/".to_string()))
            .await
            .map_err(StorageError::S3)?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("Storage configuration error: {0}")]
    Config(String),
}
