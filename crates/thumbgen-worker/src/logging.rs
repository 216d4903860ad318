//! Structured job logging.

use tracing::{error, info};

use thumbgen_models::JobId;

/// Logger carrying job ID and object name through lifecycle events.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    object_name: String,
}

impl JobLogger {
    /// Create a logger for one job.
    pub fn new(job_id: &JobId, object_name: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            object_name: object_name.to_string(),
        }
    }

    /// Log the start of a job.
    pub fn log_start(&self) {
        info!(
            job_id = %self.job_id,
            object = %self.object_name,
            "Job started"
        );
    }

    /// Log an error during the job.
    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            object = %self.object_name,
            "Job error: {}", message
        );
    }

    /// Log job completion.
    pub fn log_completion(&self) {
        info!(
            job_id = %self.job_id,
            object = %self.object_name,
            "Job completed"
        );
    }

    /// Get the job ID.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_creation() {
        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, "IMG_1.mp4");
        assert_eq!(logger.job_id(), job_id.to_string());
    }
}
