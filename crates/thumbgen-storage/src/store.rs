//! Object-store trait seam.

use std::path::Path;

use async_trait::async_trait;

use crate::client::S3Client;
use crate::error::StorageResult;

/// Remote object-store operations the pipeline depends on.
///
/// The pipeline only ever downloads one video and uploads one image,
/// so the surface is kept to exactly those two operations. Tests
/// substitute an in-memory implementation.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Download `bucket/key` into a local file.
    async fn download_file(&self, bucket: &str, key: &str, path: &Path) -> StorageResult<()>;

    /// Upload a local file to `bucket/key`.
    async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
        public_read: bool,
    ) -> StorageResult<()>;
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn download_file(&self, bucket: &str, key: &str, path: &Path) -> StorageResult<()> {
        S3Client::download_file(self, bucket, key, path).await
    }

    async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
        public_read: bool,
    ) -> StorageResult<()> {
        S3Client::upload_file(self, bucket, key, path, content_type, public_read).await
    }
}
