//! Transcode worker binary.
//!
//! Runs the worker pool against the shared job store. Uploads are recorded
//! by a separate ingestion process, so the binary polls the store for
//! QUEUED rows and wakes the pool when it finds any.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shareclip_media::FfmpegTranscoder;
use shareclip_queue::{Dispatcher, EventBus, SqliteJobStore};
use shareclip_worker::{metrics, TranscodeService, WorkerConfig, WorkerPool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing()?;

    info!("Starting shareclip-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(addr) = config.metrics_addr {
        metrics::init_metrics(addr).context("failed to start Prometheus exporter")?;
        info!("Serving metrics on {}", addr);
    }

    for dir in [config.input_dir(), config.output_root()] {
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create data directory {}", dir.display()))?;
    }

    let store = SqliteJobStore::connect(&config.database_url)
        .await
        .context("failed to open job store")?;
    store
        .init_schema()
        .await
        .context("failed to initialise job store schema")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let transcoder = FfmpegTranscoder::new(
        config.encoder.codec_preference(),
        config.encoder.encode_profile(),
        shutdown_rx.clone(),
    );
    let bus = Arc::new(EventBus::new(config.event_buffer));
    let dispatcher = Arc::new(Dispatcher::new());
    let job_store = Arc::new(store.clone());
    let poll_interval = config.queue_poll_interval;

    let pool = WorkerPool::new(
        Arc::new(config),
        job_store.clone(),
        Arc::clone(&dispatcher),
        Arc::clone(&bus),
        Arc::new(transcoder),
        shutdown_rx.clone(),
    );

    if let Some(interval) = poll_interval {
        let service = TranscodeService::new(job_store, dispatcher, bus);
        let shutdown = shutdown_rx.clone();
        info!("Polling for queued jobs every {:?}", interval);
        tokio::spawn(async move { service.poll_queue(interval, shutdown).await });
    }

    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    pool.run().await.context("worker pool failed")?;
    store.close().await;

    info!("Worker shutdown complete");
    Ok(())
}

/// Colored output for dev, JSON for production.
fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("shareclip=info".parse()?)
        .add_directive("sqlx=warn".parse()?);

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
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT, shutting down"),
                }
            }
            Err(e) => {
                tracing::warn!("Cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                info!("Received SIGINT, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl+C, shutting down");
    }
}
