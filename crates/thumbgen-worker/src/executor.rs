//! Job executor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use thumbgen_queue::{JobQueue, ThumbnailJob};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::pipeline::{run_pipeline, PipelineContext};

/// Executor that consumes thumbnail jobs from the queue and runs the
/// pipeline for each, bounded by a semaphore.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    ctx: Arc<PipelineContext>,
    job_semaphore: Arc<Semaphore>,
    shutdown: tokio::sync::watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    /// Create a new job executor.
    pub fn new(config: WorkerConfig, queue: JobQueue, ctx: PipelineContext) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = tokio::sync::watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            queue: Arc::new(queue),
            ctx: Arc::new(ctx),
            job_semaphore,
            shutdown,
            consumer_name,
        }
    }

    /// Start the executor. Returns when shutdown is signalled.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting job executor '{}' with {} max concurrent jobs",
            self.consumer_name, self.config.max_concurrent_jobs
        );

        // The broker may come up after the worker does
        self.queue.init_with_retry().await?;

        let mut shutdown_rx = self.shutdown.subscribe();

        // Periodically claim jobs orphaned by crashed workers
        let queue_clone = Arc::clone(&self.queue);
        let consumer_name = self.consumer_name.clone();
        let ctx_clone = Arc::clone(&self.ctx);
        let semaphore_clone = Arc::clone(&self.job_semaphore);
        let claim_interval = self.config.claim_interval;
        let claim_min_idle_ms = self.config.claim_min_idle.as_millis() as u64;
        let job_timeout = self.config.job_timeout;
        let mut shutdown_rx_claim = self.shutdown.subscribe();

        let claim_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(claim_interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx_claim.changed() => {
                        if *shutdown_rx_claim.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        match queue_clone.claim_pending(&consumer_name, claim_min_idle_ms, 5).await {
                            Ok(jobs) if !jobs.is_empty() => {
                                info!("Claimed {} pending jobs", jobs.len());
                                for (message_id, job) in jobs {
                                    let ctx = Arc::clone(&ctx_clone);
                                    let queue = Arc::clone(&queue_clone);
                                    let Ok(permit) = semaphore_clone.clone().acquire_owned().await
                                    else {
                                        return;
                                    };

                                    tokio::spawn(async move {
                                        let _permit = permit;
                                        Self::execute_job(ctx, queue, message_id, job, job_timeout)
                                            .await;
                                    });
                                }
                            }
                            Ok(_) => {}
                            Err(e) => {
                                warn!("Failed to claim pending jobs: {}", e);
                            }
                        }
                    }
                }
            }
        });

        // Main job consumption loop
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_jobs() => {
                    if let Err(e) = result {
                        error!("Error consuming jobs: {}", e);
                        // Back off on error
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();

        info!("Waiting for in-flight jobs to complete...");
        let _ = tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs()).await;

        info!("Job executor stopped");
        Ok(())
    }

    /// Consume jobs up to the free concurrency slots.
    async fn consume_jobs(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let jobs = self
            .queue
            .consume(
                &self.consumer_name,
                1000, // Block for 1 second
                available.min(5),
            )
            .await?;

        if jobs.is_empty() {
            return Ok(());
        }

        debug!("Consumed {} jobs from queue", jobs.len());

        for (message_id, job) in jobs {
            let ctx = Arc::clone(&self.ctx);
            let queue = Arc::clone(&self.queue);
            let job_timeout = self.config.job_timeout;
            let permit = self
                .job_semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::job_failed("Semaphore closed"))?;

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_job(ctx, queue, message_id, job, job_timeout).await;
            });
        }

        Ok(())
    }

    /// Execute a single job with per-kind retry and DLQ handling.
    async fn execute_job(
        ctx: Arc<PipelineContext>,
        queue: Arc<JobQueue>,
        message_id: String,
        job: ThumbnailJob,
        job_timeout: Duration,
    ) {
        let logger = JobLogger::new(&job.job_id, &job.object_name);
        logger.log_start();

        let result = match tokio::time::timeout(job_timeout, run_pipeline(&ctx, &job.object_name))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(WorkerError::job_failed(format!(
                "timed out after {:?}",
                job_timeout
            ))),
        };

        match result {
            Ok(()) => {
                logger.log_completion();
                if let Err(e) = queue.ack(&message_id).await {
                    error!("Failed to ack job {}: {}", job.job_id, e);
                }
                if let Err(e) = queue.clear_dedup(&job).await {
                    warn!("Failed to clear dedup key for job {}: {}", job.job_id, e);
                }
            }
            Err(e) => {
                logger.log_error(&e.to_string());

                // Permanent failures go straight to the DLQ; a
                // malformed name or an undecodable video will not get
                // better on redelivery.
                let exhausted = if e.is_retryable() {
                    let retry_count = queue.increment_retry(&message_id).await.unwrap_or(u32::MAX);
                    let max_retries = queue.max_retries();
                    if retry_count < max_retries {
                        info!(
                            "Job {} will be retried (attempt {}/{})",
                            job.job_id, retry_count, max_retries
                        );
                        // Redelivered after the claim idle window
                        false
                    } else {
                        warn!(
                            "Job {} exceeded max retries ({}), moving to DLQ",
                            job.job_id, max_retries
                        );
                        true
                    }
                } else {
                    warn!("Job {} failed permanently, moving to DLQ", job.job_id);
                    true
                };

                if exhausted {
                    if let Err(dlq_err) = queue.dlq(&message_id, &job, &e.to_string()).await {
                        error!("Failed to move job {} to DLQ: {}", job.job_id, dlq_err);
                    }
                    if let Err(e) = queue.clear_dedup(&job).await {
                        warn!("Failed to clear dedup key for job {}: {}", job.job_id, e);
                    }
                }
            }
        }
    }

    /// Wait for all in-flight jobs to complete.
    async fn wait_for_jobs(&self) {
        loop {
            if self.job_semaphore.available_permits() == self.config.max_concurrent_jobs {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}
