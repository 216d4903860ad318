//! The thumbnail pipeline: fetch, extract, publish.
//!
//! One invocation is a linear sequence of stages sharing a working
//! folder keyed by the object's base name. A failing stage aborts the
//! run with its error kind intact; completed stages are not rolled
//! back, so a failed run can leave artifacts behind for inspection.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use thumbgen_media::WorkDir;
use thumbgen_models::{ObjectName, THUMBNAIL_CONTENT_TYPE};
use thumbgen_storage::{ObjectStore, S3Config};

use crate::error::WorkerResult;
use crate::extractor::FrameExtractor;

/// Everything one invocation needs, constructed once at startup and
/// shared across jobs. No stage reads the environment.
pub struct PipelineContext {
    /// Remote object store
    pub store: Arc<dyn ObjectStore>,
    /// Frame extractor
    pub extractor: Arc<dyn FrameExtractor>,
    /// Bucket holding source videos
    pub source_bucket: String,
    /// Bucket receiving thumbnails
    pub thumbnail_bucket: String,
    /// Root for per-invocation working folders
    pub work_root: PathBuf,
}

impl PipelineContext {
    /// Build a context from a store handle, an extractor and the
    /// storage configuration.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        extractor: Arc<dyn FrameExtractor>,
        config: &S3Config,
        work_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            extractor,
            source_bucket: config.source_bucket.clone(),
            thumbnail_bucket: config.thumbnail_bucket.clone(),
            work_root: work_root.into(),
        }
    }
}

/// Fetch the source video into a fresh working folder.
///
/// Folder creation is idempotent; the download is byte-identical to
/// the stored object. Store errors propagate, retries belong to the
/// scheduler.
async fn fetch(ctx: &PipelineContext, name: &ObjectName) -> WorkerResult<(WorkDir, PathBuf)> {
    let workdir = WorkDir::create(&ctx.work_root, name.base()).await?;
    let video_path = workdir.video_path(name.extension());

    ctx.store
        .download_file(&ctx.source_bucket, &name.key(), &video_path)
        .await?;

    Ok((workdir, video_path))
}

/// Upload the thumbnail publicly readable, then tear the working
/// folder down.
///
/// Teardown runs whether or not the upload landed: a retried
/// invocation redoes the whole pipeline, so keeping the local image
/// after a failed upload buys nothing. The upload error still wins if
/// both steps fail.
async fn publish(
    ctx: &PipelineContext,
    name: &ObjectName,
    workdir: &WorkDir,
    image_path: &Path,
) -> WorkerResult<()> {
    let upload_result = ctx
        .store
        .upload_file(
            &ctx.thumbnail_bucket,
            &name.thumbnail_key(),
            image_path,
            THUMBNAIL_CONTENT_TYPE,
            true,
        )
        .await;

    let cleanup_result = workdir.remove().await;

    // Either failure is the caller's to report; the upload error wins
    // when both fail.
    upload_result?;
    cleanup_result?;
    Ok(())
}

/// Run the full pipeline for one object identifier.
pub async fn run_pipeline(ctx: &PipelineContext, object_name: &str) -> WorkerResult<()> {
    let name = ObjectName::parse(object_name)?;

    info!(object = %name, stage = "fetching", "Downloading source video");
    let (workdir, video_path) = fetch(ctx, &name).await?;

    info!(object = %name, stage = "extracting", "Extracting midpoint frame");
    let image_path = ctx.extractor.extract(&video_path).await?;

    info!(object = %name, stage = "publishing", "Uploading thumbnail");
    publish(ctx, &name, &workdir, &image_path).await?;

    info!(object = %name, "Thumbnail published as {}", name.thumbnail_key());
    Ok(())
}

/// Boolean boundary for external consumers: `true` when every stage
/// completed and the working folder is gone, `false` otherwise. The
/// error is logged here, never propagated.
pub async fn extract_thumbnail(ctx: &PipelineContext, object_name: &str) -> bool {
    match run_pipeline(ctx, object_name).await {
        Ok(()) => true,
        Err(e) => {
            warn!(object = %object_name, "Thumbnail extraction failed: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;
    use tokio::fs;

    use thumbgen_media::{MediaError, MediaResult};
    use thumbgen_storage::{StorageError, StorageResult};

    use crate::error::WorkerError;

    /// Recorded upload for assertions.
    #[derive(Debug, Clone)]
    struct Upload {
        bucket: String,
        key: String,
        bytes: Vec<u8>,
        content_type: String,
        public_read: bool,
    }

    /// In-memory object store.
    #[derive(Default)]
    struct MemoryStore {
        objects: Mutex<HashMap<(String, String), Vec<u8>>>,
        uploads: Mutex<Vec<Upload>>,
        downloads: Mutex<u32>,
        fail_upload: bool,
    }

    impl MemoryStore {
        fn with_object(bucket: &str, key: &str, bytes: &[u8]) -> Self {
            let store = Self::default();
            store
                .objects
                .lock()
                .unwrap()
                .insert((bucket.to_string(), key.to_string()), bytes.to_vec());
            store
        }

        fn failing_uploads(mut self) -> Self {
            self.fail_upload = true;
            self
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        async fn download_file(&self, bucket: &str, key: &str, path: &Path) -> StorageResult<()> {
            *self.downloads.lock().unwrap() += 1;
            let bytes = self
                .objects
                .lock()
                .unwrap()
                .get(&(bucket.to_string(), key.to_string()))
                .cloned()
                .ok_or_else(|| StorageError::not_found(key))?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(path, bytes).await?;
            Ok(())
        }

        async fn upload_file(
            &self,
            bucket: &str,
            key: &str,
            path: &Path,
            content_type: &str,
            public_read: bool,
        ) -> StorageResult<()> {
            if self.fail_upload {
                return Err(StorageError::upload_failed("injected failure"));
            }
            let bytes = fs::read(path).await?;
            self.uploads.lock().unwrap().push(Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                bytes,
                content_type: content_type.to_string(),
                public_read,
            });
            Ok(())
        }
    }

    /// Extractor double: writes the video bytes as the "frame" and
    /// deletes the source, mirroring the real side-effect ordering.
    /// Empty input behaves like an empty stream.
    struct FakeExtractor;

    #[async_trait]
    impl FrameExtractor for FakeExtractor {
        async fn extract(&self, video_path: &Path) -> MediaResult<PathBuf> {
            let bytes = fs::read(video_path).await?;
            if bytes.is_empty() {
                return Err(MediaError::EmptyStream(video_path.to_path_buf()));
            }
            let image_path = video_path.with_extension("jpg");
            fs::write(&image_path, &bytes).await?;
            fs::remove_file(video_path).await?;
            Ok(image_path)
        }
    }

    fn context(store: MemoryStore, work_root: &Path) -> (PipelineContext, Arc<MemoryStore>) {
        let store = Arc::new(store);
        let ctx = PipelineContext {
            store: Arc::clone(&store) as Arc<dyn ObjectStore>,
            extractor: Arc::new(FakeExtractor),
            source_bucket: "videos".to_string(),
            thumbnail_bucket: "thumbnails".to_string(),
            work_root: work_root.to_path_buf(),
        };
        (ctx, store)
    }

    #[tokio::test]
    async fn test_successful_run_publishes_and_cleans_up() {
        let root = TempDir::new().unwrap();
        let (ctx, store) = context(
            MemoryStore::with_object("videos", "IMG_1.mp4", b"frame-bytes"),
            root.path(),
        );

        run_pipeline(&ctx, "IMG_1.mp4").await.unwrap();

        let uploads = store.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].bucket, "thumbnails");
        assert_eq!(uploads[0].key, "IMG_1.jpg");
        assert_eq!(uploads[0].bytes, b"frame-bytes");
        assert_eq!(uploads[0].content_type, "image/jpeg");
        assert!(uploads[0].public_read);

        // no residual working folder
        assert!(!root.path().join("IMG_1").exists());
    }

    #[tokio::test]
    async fn test_malformed_identifier_fails_before_any_store_call() {
        let root = TempDir::new().unwrap();
        let (ctx, store) = context(MemoryStore::default(), root.path());

        let err = run_pipeline(&ctx, "two.dots.mp4").await.unwrap_err();
        assert!(matches!(err, WorkerError::Name(_)));
        assert_eq!(*store.downloads.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_object_leaves_workdir_for_inspection() {
        let root = TempDir::new().unwrap();
        let (ctx, store) = context(MemoryStore::default(), root.path());

        let err = run_pipeline(&ctx, "IMG_1.mp4").await.unwrap_err();
        assert!(matches!(err, WorkerError::Storage(StorageError::NotFound(_))));
        assert!(err.is_retryable());
        assert!(store.uploads.lock().unwrap().is_empty());
        assert!(root.path().join("IMG_1").exists());
    }

    #[tokio::test]
    async fn test_decode_failure_keeps_video_and_uploads_nothing() {
        let root = TempDir::new().unwrap();
        let (ctx, store) = context(
            MemoryStore::with_object("videos", "IMG_1.mp4", b""),
            root.path(),
        );

        let err = run_pipeline(&ctx, "IMG_1.mp4").await.unwrap_err();
        assert!(matches!(err, WorkerError::Media(MediaError::EmptyStream(_))));
        assert!(!err.is_retryable());
        assert!(store.uploads.lock().unwrap().is_empty());

        // the source video stays on disk
        assert!(root.path().join("IMG_1").join("IMG_1.mp4").exists());
        assert!(!root.path().join("IMG_1").join("IMG_1.jpg").exists());
    }

    #[tokio::test]
    async fn test_upload_failure_still_removes_workdir() {
        let root = TempDir::new().unwrap();
        let (ctx, _store) = context(
            MemoryStore::with_object("videos", "IMG_1.mp4", b"frame-bytes").failing_uploads(),
            root.path(),
        );

        let err = run_pipeline(&ctx, "IMG_1.mp4").await.unwrap_err();
        assert!(matches!(
            err,
            WorkerError::Storage(StorageError::UploadFailed(_))
        ));
        assert!(!root.path().join("IMG_1").exists());
    }

    #[tokio::test]
    async fn test_rerun_is_deterministic() {
        let root = TempDir::new().unwrap();
        let (ctx, store) = context(
            MemoryStore::with_object("videos", "IMG_1.mp4", b"frame-bytes"),
            root.path(),
        );

        run_pipeline(&ctx, "IMG_1.mp4").await.unwrap();
        run_pipeline(&ctx, "IMG_1.mp4").await.unwrap();

        let uploads = store.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 2);
        assert_eq!(uploads[0].bytes, uploads[1].bytes);
    }

    #[tokio::test]
    async fn test_boolean_boundary() {
        let root = TempDir::new().unwrap();
        let (ctx, _store) = context(
            MemoryStore::with_object("videos", "IMG_1.mp4", b"frame-bytes"),
            root.path(),
        );

        assert!(extract_thumbnail(&ctx, "IMG_1.mp4").await);
        assert!(!extract_thumbnail(&ctx, "missing.mp4").await);
        assert!(!extract_thumbnail(&ctx, "not-a-video").await);
    }
}
