use std::process::ExitCode;
use std::sync::Arc;

use paydispatch::config::{QueueCapacity, Settings};
use paydispatch::core::health::HealthCache;
use paydispatch::core::poller::HealthPoller;
use paydispatch::core::queue::IngestBuffer;
use paydispatch::core::recorder::TransactionRecorder;
use paydispatch::core::router::GatewayRouter;
use paydispatch::core::worker::WorkerPool;
use paydispatch::http::{AppState, build_router};
use paydispatch::{db, logging};

#[tokio::main]
async fn main() -> ExitCode {
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("startup failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&settings);

    let pool = match db::connect(&settings.database_url, settings.db_pool_size).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "failed to connect to the store");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = db::run_migrations(&pool).await {
        tracing::error!(error = %e, "failed to run migrations");
        return ExitCode::FAILURE;
    }

    let mut client_builder = reqwest::Client::builder()
        .pool_max_idle_per_host(settings.http_pool_size)
        .pool_idle_timeout(settings.http_pool_idle_timeout);
    if let Some(connect_timeout) = settings.gateway_connect_timeout {
        client_builder = client_builder.connect_timeout(connect_timeout);
    }
    let client = match client_builder.build() {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "failed to build the outbound HTTP client");
            return ExitCode::FAILURE;
        }
    };

    let health_cache = Arc::new(HealthCache::new());
    let recorder = Arc::new(TransactionRecorder::new(pool));

    let poller = HealthPoller::new(
        client.clone(),
        health_cache.clone(),
        settings.default_base_url.clone(),
        settings.fallback_base_url.clone(),
        settings.health_poll_interval,
        settings.gateway_request_timeout,
    );
    tokio::spawn(poller.run());

    let router = Arc::new(GatewayRouter::new(
        client,
        health_cache.clone(),
        recorder.clone(),
        settings.default_base_url.clone(),
        settings.fallback_base_url.clone(),
        settings.gateway_request_timeout,
        settings.health_slow_threshold_ms,
    ));

    let buffer = Arc::new(match settings.queue_capacity {
        QueueCapacity::Bounded(n) => IngestBuffer::bounded(n),
        QueueCapacity::Unbounded => IngestBuffer::unbounded(),
    });

    let worker_pool = Arc::new(WorkerPool::new(
        buffer.clone(),
        router,
        settings.worker_count,
        settings.requeue_cooldown,
    ));
    worker_pool.spawn();

    let state = Arc::new(AppState {
        buffer,
        health_cache,
        recorder,
        slow_threshold_ms: settings.health_slow_threshold_ms,
    });
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", settings.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, addr, "failed to bind listen socket");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(addr, "paydispatch listening");

    let shutdown_pool = worker_pool.clone();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_pool))
        .await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "server error");
            ExitCode::FAILURE
        }
    }
}

/// Waits for SIGINT or SIGTERM, then signals the worker pool to stop
/// taking new work. Axum drains in-flight HTTP connections on its own once
/// this future resolves.
async fn shutdown_signal(worker_pool: Arc<WorkerPool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining");
    worker_pool.request_shutdown();
}
