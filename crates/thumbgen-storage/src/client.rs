//! S3 client implementation.

use std::path::Path;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// Configuration for the S3 client and the two buckets the pipeline
/// touches. Loaded once at startup and threaded down explicitly.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Region name
    pub region: String,
    /// S3 API endpoint URL
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket holding source videos
    pub source_bucket: String,
    /// Bucket receiving published thumbnails
    pub thumbnail_bucket: String,
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            region: std::env::var("S3_REGION")
                .map_err(|_| StorageError::config_error("S3_REGION not set"))?,
            endpoint_url: std::env::var("S3_RAW_ENDPOINT")
                .map_err(|_| StorageError::config_error("S3_RAW_ENDPOINT not set"))?,
            access_key_id: std::env::var("S3_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("S3_ACCESS_KEY not set"))?,
            secret_access_key: std::env::var("S3_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("S3_SECRET_ACCESS_KEY not set"))?,
            source_bucket: std::env::var("S3_BUCKET_NAME_CONVERTED")
                .map_err(|_| StorageError::config_error("S3_BUCKET_NAME_CONVERTED not set"))?,
            thumbnail_bucket: std::env::var("S3_BUCKET_NAME_THUMBNAIL")
                .map_err(|_| StorageError::config_error("S3_BUCKET_NAME_THUMBNAIL not set"))?,
        })
    }
}

/// S3-compatible object storage client.
#[derive(Clone)]
pub struct S3Client {
    client: Client,
}

impl S3Client {
    /// Create a new client from configuration.
    ///
    /// Uses virtual-host addressing and SigV4 signing.
    pub async fn new(config: &S3Config) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "thumbgen",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(false)
            .build();

        Ok(Self {
            client: Client::from_conf(sdk_config),
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        let config = S3Config::from_env()?;
        Self::new(&config).await
    }

    /// Download an object to a local file, byte-identical.
    pub async fn download_file(
        &self,
        bucket: &str,
        key: &str,
        path: impl AsRef<Path>,
    ) -> StorageResult<()> {
        let path = path.as_ref();
        debug!("Downloading {}/{} to {}", bucket, key, path.display());

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.to_string().contains("NoSuchKey") {
                    StorageError::not_found(key)
                } else {
                    StorageError::download_failed(e.to_string())
                }
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::download_failed(e.to_string()))?
            .into_bytes();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &bytes).await?;

        info!("Downloaded {}/{} to {}", bucket, key, path.display());
        Ok(())
    }

    /// Upload a local file to an object, optionally publicly readable.
    pub async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: impl AsRef<Path>,
        content_type: &str,
        public_read: bool,
    ) -> StorageResult<()> {
        let path = path.as_ref();
        debug!("Uploading {} to {}/{}", path.display(), bucket, key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(content_type);

        if public_read {
            request = request.acl(ObjectCannedAcl::PublicRead);
        }

        request
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!("Uploaded {} to {}/{}", path.display(), bucket, key);
        Ok(())
    }
}
