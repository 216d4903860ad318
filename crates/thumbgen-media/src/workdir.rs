//! Per-invocation working directory.

use std::path::{Path, PathBuf};

use tokio::fs;

use thumbgen_models::THUMBNAIL_EXTENSION;

use crate::error::MediaResult;

/// Local directory scoped to one pipeline invocation, named after the
/// object's base name under the worker's temporary root.
///
/// Removal is an explicit call rather than a Drop guard: a failed
/// invocation leaves its artifacts on disk for inspection, and only the
/// Publisher stage tears the folder down.
#[derive(Debug, Clone)]
pub struct WorkDir {
    path: PathBuf,
    base: String,
}

impl WorkDir {
    /// Create (or reuse) the working directory for `base` under `root`.
    pub async fn create(root: impl AsRef<Path>, base: &str) -> MediaResult<Self> {
        let path = root.as_ref().join(base);
        fs::create_dir_all(&path).await?;
        Ok(Self {
            path,
            base: base.to_string(),
        })
    }

    /// Directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the downloaded video inside the directory.
    pub fn video_path(&self, extension: &str) -> PathBuf {
        self.path.join(format!("{}.{}", self.base, extension))
    }

    /// Path of the extracted thumbnail inside the directory.
    pub fn image_path(&self) -> PathBuf {
        self.path
            .join(format!("{}.{}", self.base, THUMBNAIL_EXTENSION))
    }

    /// Recursively delete the directory and everything in it.
    pub async fn remove(&self) -> MediaResult<()> {
        fs::remove_dir_all(&self.path).await?;
        Ok(())
    }
}
