//! FFmpeg CLI wrapper for midpoint-frame extraction.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and running
//! - Frame counting via FFprobe
//! - Midpoint-frame extraction to JPEG
//! - Per-invocation working-directory management

pub mod command;
pub mod error;
pub mod extract;
pub mod probe;
pub mod workdir;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use extract::{extract_midpoint_frame, midpoint_index};
pub use probe::count_frames;
pub use workdir::WorkDir;
