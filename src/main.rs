//! Order execution engine server

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use order_engine::{build_router, AppState};
use order_engine_config::{validate_config, AppConfig, ConfigLoader, ENV_PREFIX};
use order_engine_lifecycle::{LifecycleEngine, OrderService, StageTimings};
use order_engine_metrics::{init_tracing, MetricsCollector, MetricsServer};
use order_engine_queue::{JobScheduler, SchedulerConfig};
use order_engine_router::DexRouter;
use order_engine_store::SqliteOrderStore;
use order_engine_stream::{OrderStream, StreamSettings};
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "order-engine")]
#[command(about = "Market order execution engine with live status streaming")]
struct Args {
    /// Config file (TOML, YAML or JSON)
    #[arg(short, long, env = "ORDER_ENGINE_CONFIG")]
    config: Option<PathBuf>,

    /// Listen host
    #[arg(long, env = "HOST")]
    host: Option<String>,

    /// Listen port
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Database URL, e.g. sqlite://orders.db?mode=rwc
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
}

fn load_config(args: &Args) -> anyhow::Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => ConfigLoader::from_file_with_env(path, ENV_PREFIX)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ConfigLoader::from_env()?,
    };

    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(url) = &args.database_url {
        config.database.url = url.clone();
    }

    validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let config = load_config(&args)?;

    init_tracing(Some(config.log_level()), config.json_logs())?;

    info!("Starting order execution engine");
    info!("  Environment: {:?}", config.environment);
    info!("  Database: {}", config.database.url);
    info!(
        "  Queue: {} (concurrency {}, {} starts/min, {} attempts)",
        config.queue.name,
        config.queue.max_concurrency,
        config.queue.max_per_minute,
        config.queue.max_attempts
    );

    let metrics = Arc::new(MetricsCollector::new()?);

    let store = Arc::new(
        SqliteOrderStore::connect(&config.database.url, config.database.max_connections)
            .await
            .context("connecting to order store")?,
    );

    let router = Arc::new(DexRouter::simulated(
        config.router.route_delay(),
        config.router.price_variation_bps,
    ));

    let stream = OrderStream::new(StreamSettings {
        heartbeat_interval: config.stream.heartbeat_interval(),
        observer_buffer: config.stream.observer_buffer,
    });

    let engine = Arc::new(
        LifecycleEngine::new(
            store.clone(),
            router,
            stream.clone(),
            StageTimings {
                build_delay: config.router.build_delay(),
                submit_delay: config.router.submit_delay(),
                route_timeout: config.router.route_timeout(),
            },
        )
        .with_metrics(metrics.clone()),
    );

    let scheduler = JobScheduler::new(
        SchedulerConfig {
            name: config.queue.name.clone(),
            concurrency: config.queue.max_concurrency,
            max_per_window: config.queue.max_per_minute,
            rate_window: std::time::Duration::from_secs(60),
            max_attempts: config.queue.max_attempts,
            backoff_delay: config.queue.backoff_delay(),
        },
        engine,
    )?;

    spawn_failure_logger(&scheduler);
    scheduler.start()?;

    let service = Arc::new(
        OrderService::new(store, scheduler.clone()).with_metrics(metrics.clone()),
    );
    let state = AppState::new(service, stream, metrics.clone());
    let app = build_router(state);

    if config.metrics.enabled {
        let addr = format!("{}:{}", config.server.host, config.metrics.port);
        let server = MetricsServer::new(metrics.clone(), addr);
        tokio::spawn(async move {
            if let Err(e) = server.serve(shutdown_signal()).await {
                error!(error = %e, "metrics server stopped");
            }
        });
    }

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("🚀 Order engine listening on http://{}", addr);
    info!("  POST /api/orders/execute");
    info!("  WS   /api/orders/execute?orderId=<uuid>");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, draining in-flight orders");
    scheduler.close().await;
    info!("Shutdown complete");

    Ok(())
}

/// Log every failed attempt the scheduler reports.
fn spawn_failure_logger(scheduler: &JobScheduler) {
    let mut failures = scheduler.failures();
    tokio::spawn(async move {
        loop {
            match failures.recv().await {
                Ok(failure) => error!(
                    order_id = %failure.order_id,
                    attempt = failure.attempt,
                    max_attempts = failure.max_attempts,
                    is_final = failure.is_final,
                    reason = %failure.error,
                    "order attempt failed"
                ),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "failure log fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
