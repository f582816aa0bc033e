//! VisionScan server binary: HTTP API and analysis worker in one process.

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vscan_api::{create_router, metrics, ApiConfig, AppState};
use vscan_media::{BoxOverlayRenderer, FfmpegVideoOpener, YoloObjectDetector};
use vscan_queue::{JobQueue, JobRegistry, QueueConfig};
use vscan_storage::FsResultStore;
use vscan_worker::{JobExecutor, ProcessingContext, WorkerConfig};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    if let Err(e) = run().await {
        error!("Server failed: {:#}", e);
        std::process::exit(1);
    }
}

/// Colored output for dev, JSON when `LOG_FORMAT=json`.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,vscan_api=info,vscan_worker=info"));

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
}

async fn run() -> anyhow::Result<()> {
    info!("Starting vscan-api");

    let api_config = ApiConfig::from_env();
    let worker_config = WorkerConfig::from_env();
    let queue_config = QueueConfig::from_env();
    info!(
        host = %api_config.host,
        port = api_config.port,
        max_concurrent_jobs = worker_config.max_concurrent_jobs,
        queue_depth = queue_config.depth,
        "Loaded configuration"
    );

    let store = FsResultStore::from_env();
    store
        .ensure_dirs()
        .await
        .context("failed to create storage directories")?;

    let metrics_handle = if api_config.metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics().context("failed to install Prometheus recorder")?)
    } else {
        None
    };

    let detector = YoloObjectDetector::new(worker_config.detector.clone())
        .context("failed to load object detection model")?;

    let registry = Arc::new(JobRegistry::new());
    let (queue, receiver) = JobQueue::new(queue_config);

    let ctx = ProcessingContext::new(
        worker_config,
        Arc::clone(&registry),
        store.clone(),
        Arc::new(FfmpegVideoOpener::new()),
        Arc::new(detector),
        Arc::new(BoxOverlayRenderer::default()),
    );
    let executor = Arc::new(JobExecutor::new(Arc::new(ctx)));
    let worker = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move { executor.run(receiver).await })
    };

    let state = AppState::new(api_config.clone(), registry, queue, store);
    let app = create_router(state, metrics_handle);

    let addr = api_config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    executor.shutdown();
    if let Err(e) = worker.await {
        warn!("Worker task ended abnormally: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
