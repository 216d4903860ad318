//! Redis Streams job queue.
//!
//! This crate provides:
//! - Thumbnail job enqueueing with idempotency keys
//! - Consumer-group consumption with retry counters and a DLQ
//! - Startup connection retry against the broker

pub mod error;
pub mod job;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use job::ThumbnailJob;
pub use queue::{JobQueue, QueueConfig};
