//! Worker error types.
//!
//! Every pipeline failure keeps its kind: the executor decides retry
//! policy per kind instead of collapsing everything into one failure
//! shape at the task boundary.

use thiserror::Error;

use thumbgen_media::MediaError;
use thumbgen_models::NameError;
use thumbgen_queue::QueueError;
use thumbgen_storage::StorageError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Precondition error: {0}")]
    Name(#[from] NameError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    /// Check if the error is worth retrying.
    ///
    /// Store access can fail transiently; a malformed identifier or an
    /// undecodable video fails the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WorkerError::Storage(_) | WorkerError::Queue(_) | WorkerError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_errors_are_retryable() {
        let err = WorkerError::Storage(StorageError::download_failed("connection reset"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_precondition_errors_are_permanent() {
        let err = WorkerError::Name(NameError::Malformed("a.b.c".to_string()));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_decode_errors_are_permanent() {
        let err = WorkerError::Media(MediaError::EmptyStream("/tmp/x/x.mp4".into()));
        assert!(!err.is_retryable());
    }
}
