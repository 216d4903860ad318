//! Frame extractor trait seam.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use thumbgen_media::{extract_midpoint_frame, MediaResult};

/// Midpoint-frame extraction as the pipeline sees it: one video path
/// in, one image path out, source deleted on success.
///
/// Tests substitute an implementation that needs no ffmpeg binary.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    async fn extract(&self, video_path: &Path) -> MediaResult<PathBuf>;
}

/// Production extractor backed by the ffmpeg CLI.
#[derive(Debug, Default, Clone)]
pub struct FfmpegExtractor;

#[async_trait]
impl FrameExtractor for FfmpegExtractor {
    async fn extract(&self, video_path: &Path) -> MediaResult<PathBuf> {
        extract_midpoint_frame(video_path).await
    }
}
