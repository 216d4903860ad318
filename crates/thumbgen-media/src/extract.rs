//! Midpoint-frame extraction.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::info;

use thumbgen_models::THUMBNAIL_EXTENSION;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::count_frames;

/// Index of the representative frame for a stream of `total_frames`.
///
/// Lower midpoint for even counts; `None` for an empty stream.
pub fn midpoint_index(total_frames: u64) -> Option<u64> {
    if total_frames == 0 {
        None
    } else {
        Some(total_frames / 2)
    }
}

/// Extract the midpoint frame of a video as a JPEG next to it, then
/// remove the video file.
///
/// The source is deleted only after the image write is confirmed:
/// a failed probe or decode returns with the video still on disk.
pub async fn extract_midpoint_frame(video_path: impl AsRef<Path>) -> MediaResult<PathBuf> {
    let video_path = video_path.as_ref();

    if !video_path.exists() {
        return Err(MediaError::FileNotFound(video_path.to_path_buf()));
    }

    let total_frames = count_frames(video_path).await?;
    let target = midpoint_index(total_frames)
        .ok_or_else(|| MediaError::EmptyStream(video_path.to_path_buf()))?;

    let output_path = video_path.with_extension(THUMBNAIL_EXTENSION);
    let filter = format!("select=eq(n\\,{})", target);

    let cmd = FfmpegCommand::new(video_path, &output_path)
        .video_filter(&filter)
        .output_arg("-vsync")
        .output_arg("0")
        .single_frame()
        .quality(2)
        .log_level("error");

    FfmpegRunner::new().run(&cmd).await?;

    // FFmpeg can exit zero without emitting a frame when the selected
    // index is not decodable; confirm the write before touching the
    // source.
    let written = fs::metadata(&output_path)
        .await
        .map(|m| m.len() > 0)
        .unwrap_or(false);
    if !written {
        fs::remove_file(&output_path).await.ok();
        return Err(MediaError::FrameDecodeFailed(video_path.to_path_buf()));
    }

    fs::remove_file(video_path).await?;

    info!(
        "Extracted frame {} of {} to {}",
        target,
        total_frames,
        output_path.display()
    );

    Ok(output_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midpoint_even_count_takes_lower_index() {
        assert_eq!(midpoint_index(10), Some(5));
        assert_eq!(midpoint_index(2), Some(1));
    }

    #[test]
    fn test_midpoint_odd_count() {
        assert_eq!(midpoint_index(9), Some(4));
        assert_eq!(midpoint_index(1), Some(0));
    }

    #[test]
    fn test_midpoint_empty_stream() {
        assert_eq!(midpoint_index(0), None);
    }

    #[tokio::test]
    async fn test_missing_video_is_an_error() {
        let err = extract_midpoint_frame("/nonexistent/clip.mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
