//! Job queue using Redis Streams.

use std::time::Duration;

use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::job::ThumbnailJob;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream name for jobs
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// Dead letter queue stream name
    pub dlq_stream_name: String,
    /// Max retries before DLQ
    pub max_retries: u32,
}

/// Assemble a redis URL from broker host and port. Jobs live in
/// database 2.
fn broker_url(hostname: &str, port: &str) -> String {
    format!("redis://{}:{}/2", hostname, port)
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: broker_url("localhost", "6381"),
            stream_name: "thumbgen:jobs".to_string(),
            consumer_group: "thumbgen:workers".to_string(),
            dlq_stream_name: "thumbgen:dlq".to_string(),
            max_retries: 3,
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    ///
    /// The broker address is given as host/port rather than a full URL.
    pub fn from_env() -> Self {
        let hostname =
            std::env::var("REDIS_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = std::env::var("REDIS_PORT").unwrap_or_else(|_| "6381".to_string());

        Self {
            redis_url: broker_url(&hostname, &port),
            stream_name: std::env::var("QUEUE_STREAM")
                .unwrap_or_else(|_| "thumbgen:jobs".to_string()),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or_else(|_| "thumbgen:workers".to_string()),
            dlq_stream_name: std::env::var("QUEUE_DLQ_STREAM")
                .unwrap_or_else(|_| "thumbgen:dlq".to_string()),
            max_retries: std::env::var("QUEUE_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
        }
    }
}

/// Job queue client.
pub struct JobQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl JobQueue {
    /// Create a new job queue.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    /// Initialize the queue (create consumer group if not exists).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(
                    "Consumer group already exists: {}",
                    self.config.consumer_group
                );
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Initialize the queue, retrying with backoff until the broker is
    /// reachable. The worker is expected to outwait a slow broker at
    /// startup rather than fail fast.
    pub async fn init_with_retry(&self) -> QueueResult<()> {
        let mut delay = Duration::from_secs(1);
        let max_delay = Duration::from_secs(30);

        loop {
            match self.init().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!("Broker not reachable ({}), retrying in {:?}", e, delay);
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(max_delay);
                }
            }
        }
    }

    /// Enqueue a thumbnail job.
    pub async fn enqueue(&self, job: &ThumbnailJob) -> QueueResult<String> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let payload = serde_json::to_string(job)?;
        let idempotency_key = job.idempotency_key();

        let dedup_key = format!("thumbgen:dedup:{}", idempotency_key);
        let exists: bool = conn.exists(&dedup_key).await?;
        if exists {
            warn!("Duplicate job rejected: {}", idempotency_key);
            return Err(QueueError::enqueue_failed("Duplicate job"));
        }

        let message_id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("key")
            .arg(&idempotency_key)
            .query_async(&mut conn)
            .await?;

        // Dedup key expires after an hour
        conn.set_ex::<_, _, ()>(&dedup_key, "1", 3600).await?;

        info!(
            "Enqueued job {} for {} with message ID {}",
            job.job_id, job.object_name, message_id
        );

        Ok(message_id)
    }

    /// Acknowledge a job (mark as completed) and drop it from the stream.
    pub async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!("Acknowledged job: {}", message_id);
        Ok(())
    }

    /// Move a job to the dead letter queue.
    pub async fn dlq(&self, message_id: &str, job: &ThumbnailJob, error: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let payload = serde_json::to_string(job)?;

        redis::cmd("XADD")
            .arg(&self.config.dlq_stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("error")
            .arg(error)
            .arg("original_id")
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        self.ack(message_id).await?;

        warn!("Moved job {} to DLQ: {}", job.job_id, error);
        Ok(())
    }

    /// Clear the dedup key so the same object can be re-enqueued.
    pub async fn clear_dedup(&self, job: &ThumbnailJob) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let dedup_key = format!("thumbgen:dedup:{}", job.idempotency_key());
        conn.del::<_, ()>(&dedup_key).await?;
        Ok(())
    }

    /// Consume jobs from the queue.
    /// Returns (message_id, job) pairs.
    pub async fn consume(
        &self,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, ThumbnailJob)>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">") // Only new messages
            .query_async(&mut conn)
            .await?;

        let mut jobs = Vec::new();

        for stream_key in result.keys {
            for entry in stream_key.ids {
                let message_id = entry.id.clone();

                if let Some(redis::Value::BulkString(payload)) = entry.map.get("job") {
                    let payload_str = String::from_utf8_lossy(payload);
                    match serde_json::from_str::<ThumbnailJob>(&payload_str) {
                        Ok(job) => {
                            debug!("Consumed job {} from stream", job.job_id);
                            jobs.push((message_id, job));
                        }
                        Err(e) => {
                            warn!("Failed to parse job payload: {}", e);
                            // Ack the malformed message to prevent reprocessing
                            self.ack(&message_id).await.ok();
                        }
                    }
                }
            }
        }

        Ok(jobs)
    }

    /// Build the XAUTOCLAIM command scanning the whole pending-entries
    /// list from `0-0`. XCLAIM would need concrete message IDs;
    /// XAUTOCLAIM is the scan-by-idle-time form that takes COUNT.
    fn autoclaim_cmd(&self, consumer_name: &str, min_idle_ms: u64, count: usize) -> redis::Cmd {
        let mut cmd = redis::cmd("XAUTOCLAIM");
        cmd.arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg(min_idle_ms)
            .arg("0-0")
            .arg("COUNT")
            .arg(count);
        cmd
    }

    /// Claim pending jobs that have been idle for too long.
    ///
    /// This both recovers jobs from crashed workers and redelivers
    /// jobs left un-acked for retry.
    pub async fn claim_pending(
        &self,
        consumer_name: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, ThumbnailJob)>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: redis::streams::StreamAutoClaimReply = self
            .autoclaim_cmd(consumer_name, min_idle_ms, count)
            .query_async(&mut conn)
            .await?;

        let mut jobs = Vec::new();

        for entry in result.claimed {
            let message_id = entry.id.clone();

            if let Some(redis::Value::BulkString(payload)) = entry.map.get("job") {
                let payload_str = String::from_utf8_lossy(payload);
                match serde_json::from_str::<ThumbnailJob>(&payload_str) {
                    Ok(job) => {
                        info!("Claimed pending job {} from stream", job.job_id);
                        jobs.push((message_id, job));
                    }
                    Err(e) => {
                        warn!("Failed to parse claimed job payload: {}", e);
                        self.ack(&message_id).await.ok();
                    }
                }
            }
        }

        Ok(jobs)
    }

    /// Get retry count for a message.
    pub async fn get_retry_count(&self, message_id: &str) -> QueueResult<u32> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let key = format!("thumbgen:retry:{}", message_id);
        let count: Option<u32> = conn.get(&key).await?;
        Ok(count.unwrap_or(0))
    }

    /// Increment retry count for a message.
    pub async fn increment_retry(&self, message_id: &str) -> QueueResult<u32> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let key = format!("thumbgen:retry:{}", message_id);
        let count: u32 = conn.incr(&key, 1).await?;
        // Retry counters expire after a day
        conn.expire::<_, ()>(&key, 86400).await?;
        Ok(count)
    }

    /// Get max retries from config.
    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_url_shape() {
        assert_eq!(broker_url("localhost", "6381"), "redis://localhost:6381/2");
        assert_eq!(broker_url("redis.internal", "6379"), "redis://redis.internal:6379/2");
    }

    #[test]
    fn test_default_config() {
        let config = QueueConfig::default();
        assert_eq!(config.redis_url, "redis://localhost:6381/2");
        assert_eq!(config.stream_name, "thumbgen:jobs");
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_claim_scans_pending_entries_by_idle_time() {
        let queue = JobQueue::new(QueueConfig::default()).unwrap();
        let packed = queue
            .autoclaim_cmd("worker-1", 300_000, 5)
            .get_packed_command();
        let wire = String::from_utf8_lossy(&packed);

        // XCLAIM wants explicit message IDs and rejects COUNT; the
        // idle-time scan must go through XAUTOCLAIM.
        assert!(wire.contains("XAUTOCLAIM"));
        assert!(!wire.contains("XCLAIM\r\n"));
        assert!(wire.contains("thumbgen:jobs"));
        assert!(wire.contains("thumbgen:workers"));
        assert!(wire.contains("worker-1"));
        assert!(wire.contains("300000"));
        assert!(wire.contains("0-0"));
        assert!(wire.contains("COUNT"));
    }
}
