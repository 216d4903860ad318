//! S3 object-store client.
//!
//! This crate provides:
//! - File download from the source video bucket
//! - Thumbnail upload with content type and public-read ACL
//! - The `ObjectStore` trait seam the pipeline is written against

pub mod client;
pub mod error;
pub mod store;

pub use client::{S3Client, S3Config};
pub use error::{StorageError, StorageResult};
pub use store::ObjectStore;
