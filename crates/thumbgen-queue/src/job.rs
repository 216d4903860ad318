//! Job types for the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use thumbgen_models::JobId;

/// Job to extract and publish the thumbnail of one stored video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailJob {
    /// Unique job ID
    pub job_id: JobId,
    /// Object identifier of the source video (`<base>.<ext>`)
    pub object_name: String,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl ThumbnailJob {
    /// Create a new thumbnail job.
    pub fn new(object_name: impl Into<String>) -> Self {
        Self {
            job_id: JobId::new(),
            object_name: object_name.into(),
            created_at: Utc::now(),
        }
    }

    /// Generate idempotency key for deduplication.
    ///
    /// Keyed by object name: two live jobs for the same object would
    /// race on the same working folder, so duplicates are rejected at
    /// enqueue time.
    pub fn idempotency_key(&self) -> String {
        format!("thumbnail:{}", self.object_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotency_key_is_stable_per_object() {
        let a = ThumbnailJob::new("IMG_1.mp4");
        let b = ThumbnailJob::new("IMG_1.mp4");
        assert_eq!(a.idempotency_key(), b.idempotency_key());
        assert_ne!(a.job_id, b.job_id);
    }

    #[test]
    fn test_wire_shape() {
        let job = ThumbnailJob::new("IMG_1.mp4");
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"object_name\":\"IMG_1.mp4\""));
        assert!(json.contains("\"job_id\""));
        assert!(json.contains("\"created_at\""));

        let back: ThumbnailJob = serde_json::from_str(&json).unwrap();
        assert_eq!(back.object_name, job.object_name);
        assert_eq!(back.job_id, job.job_id);
    }
}
