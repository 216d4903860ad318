//! Video thumbnail extraction worker.
//!
//! This crate provides:
//! - The fetch → extract → publish pipeline and its cleanup contract
//! - A job executor with bounded concurrency, retries and a DLQ
//! - Graceful shutdown

pub mod config;
pub mod error;
pub mod executor;
pub mod extractor;
pub mod logging;
pub mod pipeline;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use extractor::{FfmpegExtractor, FrameExtractor};
pub use logging::JobLogger;
pub use pipeline::{extract_thumbnail, run_pipeline, PipelineContext};
