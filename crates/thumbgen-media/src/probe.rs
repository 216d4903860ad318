//! FFprobe frame counting.

use std::path::Path;
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// FFprobe JSON output format, limited to the video stream fields the
/// frame counter needs.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    nb_frames: Option<String>,
    nb_read_frames: Option<String>,
}

/// Count the decodable frames of a video file.
///
/// The container's `nb_frames` metadata is preferred; containers that
/// do not carry it (or report zero) are re-probed with `-count_frames`,
/// which decodes the stream and reports `nb_read_frames`.
pub async fn count_frames(path: impl AsRef<Path>) -> MediaResult<u64> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    if let Some(n) = probe_count(path, false).await? {
        if n > 0 {
            return Ok(n);
        }
    }

    debug!(
        "nb_frames missing for {}, counting decoded frames",
        path.display()
    );
    Ok(probe_count(path, true).await?.unwrap_or(0))
}

/// Run ffprobe against the first video stream, optionally decoding the
/// whole stream to count frames.
async fn probe_count(path: &Path, decode: bool) -> MediaResult<Option<u64>> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;

    let mut args = vec![
        "-v",
        "quiet",
        "-print_format",
        "json",
        "-show_streams",
        "-select_streams",
        "v:0",
    ];
    if decode {
        args.push("-count_frames");
    }

    let output = Command::new("ffprobe")
        .args(&args)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::ffprobe_failed(
            "FFprobe failed",
            Some(String::from_utf8_lossy(&output.stderr).to_string()),
        ));
    }

    parse_frame_count(&output.stdout, decode)
}

/// Parse the frame count out of ffprobe's JSON output.
fn parse_frame_count(json: &[u8], decoded: bool) -> MediaResult<Option<u64>> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;

    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::InvalidVideo("no video stream found".to_string()))?;

    let field = if decoded {
        &stream.nb_read_frames
    } else {
        &stream.nb_frames
    };

    Ok(field.as_ref().and_then(|s| s.parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nb_frames() {
        let json = br#"{"streams":[{"codec_type":"video","nb_frames":"10"}]}"#;
        assert_eq!(parse_frame_count(json, false).unwrap(), Some(10));
    }

    #[test]
    fn test_parse_nb_read_frames() {
        let json =
            br#"{"streams":[{"codec_type":"video","nb_read_frames":"9","nb_frames":"0"}]}"#;
        assert_eq!(parse_frame_count(json, true).unwrap(), Some(9));
    }

    #[test]
    fn test_parse_missing_count_is_none() {
        let json = br#"{"streams":[{"codec_type":"video"}]}"#;
        assert_eq!(parse_frame_count(json, false).unwrap(), None);
    }

    #[test]
    fn test_parse_skips_non_video_streams() {
        let json = br#"{"streams":[{"codec_type":"audio","nb_frames":"99"},{"codec_type":"video","nb_frames":"4"}]}"#;
        assert_eq!(parse_frame_count(json, false).unwrap(), Some(4));
    }

    #[test]
    fn test_parse_no_video_stream_is_error() {
        let json = br#"{"streams":[{"codec_type":"audio"}]}"#;
        assert!(matches!(
            parse_frame_count(json, false),
            Err(MediaError::InvalidVideo(_))
        ));
    }

    #[test]
    fn test_parse_empty_output_is_error() {
        let json = br#"{}"#;
        assert!(parse_frame_count(json, false).is_err());
    }
}
