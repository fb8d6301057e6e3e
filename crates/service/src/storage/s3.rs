use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use tracing::{debug, info, instrument};

use super::{object_key, BlobMetadata, ObjectStore, StoreError};

/// S3-compatible object store (AWS, MinIO, LocalStack).
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
    key_prefix: String,
    public_base_url: Option<String>,
}

impl S3ObjectStore {
    pub async fn new(config: &configs::StorageConfig) -> anyhow::Result<Self> {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        // Configure custom endpoint for MinIO/LocalStack
        if let Some(ref endpoint_url) = config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        // Force path-style access for MinIO compatibility
        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = S3Client::from_conf(s3_config_builder.build());

        info!(
            bucket = %config.bucket,
            region = %config.region,
            "S3 object store initialized"
        );

        Ok(Self::from_client(client, config))
    }

    pub fn from_client(client: S3Client, config: &configs::StorageConfig) -> Self {
        Self {
            client,
            bucket: config.bucket.clone(),
            key_prefix: config.key_prefix.clone(),
            public_base_url: config.public_base_url.clone(),
        }
    }

    /// Reference string handed out for a stored key.
    pub fn reference_for(&self, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{}", base, key),
            None => format!("s3://{}/{}", self.bucket, key),
        }
    }

    /// Inverse of `reference_for`; rejects references this store never issued.
    pub fn key_from_reference(&self, reference: &str) -> Result<String, StoreError> {
        let s3_prefix = format!("s3://{}/", self.bucket);
        let key = match &self.public_base_url {
            Some(base) => reference
                .strip_prefix(base.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
                .or_else(|| reference.strip_prefix(s3_prefix.as_str())),
            None => reference.strip_prefix(s3_prefix.as_str()),
        };
        match key {
            Some(k) if !k.is_empty() && !k.contains("..") => Ok(k.to_string()),
            _ => Err(StoreError::InvalidReference(reference.to_string())),
        }
    }
}

fn map_sdk_err<E, R>(e: SdkError<E, R>) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    let msg = DisplayErrorContext(&e).to_string();
    match e {
        SdkError::ServiceError(_) => StoreError::Rejected(msg),
        _ => StoreError::Unavailable(msg),
    }
}

/// S3 user metadata must be ASCII header-safe.
fn header_safe(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .collect()
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self, blob, meta), fields(bucket = %self.bucket, size_bytes = blob.len()))]
    async fn put(&self, blob: Bytes, meta: &BlobMetadata) -> Result<String, StoreError> {
        let key = object_key(&self.key_prefix, &meta.content_type);
        let mut req = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(blob))
            .content_type(&meta.content_type);
        if let Some(name) = &meta.file_name {
            req = req.metadata("original-name", header_safe(name));
        }
        if let Some(owner) = meta.owner {
            req = req.metadata("owner-id", owner.to_string());
        }
        req.send().await.map_err(map_sdk_err)?;

        debug!(s3_key = %key, "image uploaded to S3");
        Ok(self.reference_for(&key))
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn delete(&self, reference: &str) -> Result<(), StoreError> {
        let key = self.key_from_reference(reference)?;
        // DeleteObject succeeds for keys that are already gone.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(map_sdk_err)?;

        debug!(s3_key = %key, "image deleted from S3");
        Ok(())
    }
}
