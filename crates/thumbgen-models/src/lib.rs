//! Shared data models for the thumbnail worker.
//!
//! This crate provides:
//! - Object identifier parsing (`<base>.<ext>`)
//! - Job identifiers for queue bookkeeping

pub mod job;
pub mod object_name;

pub use job::JobId;
pub use object_name::{NameError, NameResult, ObjectName};

/// Content type of every published thumbnail.
pub const THUMBNAIL_CONTENT_TYPE: &str = "image/jpeg";

/// File extension of every published thumbnail.
pub const THUMBNAIL_EXTENSION: &str = "jpg";
