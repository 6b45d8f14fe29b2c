//! Warden API server.
//!
//! Startup order: configuration, logging, platform database, services,
//! delivery worker, HTTP listener. On Ctrl+C or SIGTERM the listener drains,
//! workspace engines are closed and queued deliveries get a bounded window
//! to finish.

use std::net::SocketAddr;
use std::process;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use warden_api::bootstrap::BootstrapError;
use warden_api::config::Config;
use warden_api::logging::init_logging;
use warden_api::{assemble, router, Stores};
use warden_db::{DatabaseType, DbError};

/// How long queued deliveries may run after the listener stops.
const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
enum StartupError {
    #[error("Failed to connect to platform database: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Schema(#[from] DbError),

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error("{0}")]
    Unsupported(String),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            process::exit(1);
        }
    };

    init_logging(&config.rust_log);

    info!(
        environment = %config.app_env,
        default_database = %config.default_database,
        "Starting warden-api"
    );

    match config.validate_security_config() {
        Ok(warnings) => {
            for warning in warnings {
                warn!(target: "security", "{warning}");
            }
        }
        Err(issues) => {
            for issue in &issues {
                error!(target: "security", "{issue}");
            }
            error!(target: "security", "Refusing to start in production with insecure configuration");
            process::exit(1);
        }
    }

    if let Err(e) = run(config).await {
        error!(error = %e, "warden-api stopped with an error");
        process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), StartupError> {
    let stores = platform_stores(&config).await?;
    let (state, pipeline) = assemble(&config, stores)?;

    let watcher = state.router.watch_changes(state.registry.subscribe_changes());
    let worker = pipeline.spawn();

    let app = router(state.clone());
    let listener = TcpListener::bind(config.bind_addr()).await?;
    info!(addr = %config.bind_addr(), "Listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("HTTP server stopped");
    watcher.abort();
    state.router.shutdown().await;

    // The last queue sender goes with the state; the worker then drains
    drop(state);
    match tokio::time::timeout(WORKER_DRAIN_TIMEOUT, worker).await {
        Ok(Ok(())) => info!("Delivery worker drained"),
        Ok(Err(e)) => error!(error = %e, "Delivery worker panicked"),
        Err(_) => warn!(
            timeout_secs = WORKER_DRAIN_TIMEOUT.as_secs(),
            "Delivery worker did not drain in time, pending deliveries dropped"
        ),
    }

    info!("Shutdown complete");
    Ok(())
}

/// Postgres stores when `DATABASE_URL` is Postgres. Other dialects only
/// serve as the shared tenant database; outside production the platform
/// records are then kept in memory.
async fn platform_stores(config: &Config) -> Result<Stores, StartupError> {
    if config.default_database.dialect() != DatabaseType::Postgres {
        if config.app_env.is_production() {
            return Err(StartupError::Unsupported(format!(
                "DATABASE_URL must be a Postgres database in production, got {}",
                config.default_database.dialect()
            )));
        }
        warn!(
            dialect = %config.default_database.dialect(),
            "Platform records are kept in memory and lost on restart"
        );
        return Ok(Stores::in_memory());
    }

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await?;
    info!("Connected to platform database");

    Ok(Stores::postgres(pool).await?)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
