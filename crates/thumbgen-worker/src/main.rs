//! Thumbnail worker binary.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use thumbgen_queue::JobQueue;
use thumbgen_storage::{S3Client, S3Config};
use thumbgen_worker::{FfmpegExtractor, JobExecutor, PipelineContext, WorkerConfig};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("thumbgen_worker=info".parse().expect("valid directive"))
        .add_directive("thumbgen_media=info".parse().expect("valid directive"))
        .add_directive("thumbgen_storage=info".parse().expect("valid directive"))
        .add_directive("thumbgen_queue=info".parse().expect("valid directive"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting thumbgen-worker");

    // The extractor shells out to ffmpeg/ffprobe; fail fast when missing
    if let Err(e) = thumbgen_media::check_ffmpeg() {
        error!("{}", e);
        std::process::exit(1);
    }
    if let Err(e) = thumbgen_media::check_ffprobe() {
        error!("{}", e);
        std::process::exit(1);
    }

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let s3_config = match S3Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load storage config: {}", e);
            std::process::exit(1);
        }
    };

    let store = match S3Client::new(&s3_config).await {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create storage client: {}", e);
            std::process::exit(1);
        }
    };

    let queue = match JobQueue::from_env() {
        Ok(q) => q,
        Err(e) => {
            error!("Failed to create job queue: {}", e);
            std::process::exit(1);
        }
    };

    let ctx = PipelineContext::new(
        Arc::new(store),
        Arc::new(FfmpegExtractor),
        &s3_config,
        config.work_dir.clone(),
    );

    let executor = Arc::new(JobExecutor::new(config, queue, ctx));

    // Wire ctrl-c to graceful shutdown
    let shutdown_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown_executor.shutdown();
    });

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}
