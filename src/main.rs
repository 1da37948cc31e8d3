//! Application entry point for the `floodpath-monitor` service.
//!
//! This binary orchestrates the full startup sequence:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Selecting the persistence backend (PostgreSQL when `DATABASE_URL` is
//!   set, in-memory otherwise) and creating the schema if needed
//! - Probing the snapshot source and starting the worker supervisor
//! - Mounting all API routes via the `routes` gateway (EMBP pattern)
//! - Serving HTTP until SIGINT/SIGTERM, then stopping the workers
//!
//! # Environment Variables
//! - `DATABASE_URL` (optional) – PostgreSQL connection string
//! - `PORT` (optional) – listen port (default: 10000)
//! - `APP_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `APP_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! See `config.rs` for the rest.
use std::{env, io::IsTerminal, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::Router;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use floodpath_monitor::{
    config,
    health::HealthThresholds,
    query::QueryGateway,
    rate_limit::RateLimiter,
    registry::FeedRegistry,
    routes::{self, AppState},
    run_flag::RunFlag,
    schema, source,
    store::{MemoryStore, PgStore, SnapshotStore},
    supervisor::{FeedWorkerSpawner, Supervisor},
};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let store: Arc<dyn SnapshotStore> = match &cfg.db_url {
        Some(db_url) => {
            tracing::info!("Attempting to connect to database");
            let pool = PgPoolOptions::new()
                .max_connections(cfg.db_pool_max)
                .acquire_timeout(Duration::from_secs(10))
                .connect(db_url)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Successfully connected to database");

            schema::create_schema(&pool).await?;
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, snapshots are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let registry = Arc::new(FeedRegistry::new());
    let run_flag = RunFlag::new();
    let source = source::from_config(&cfg);

    // Workers only start if the backend can operate at all. Otherwise the
    // API keeps serving stored data and /health reports the failure.
    let probe = source.probe().await;
    let supervisor = match probe {
        Ok(()) => {
            tracing::info!(backend = source.name(), "Snapshot source probe succeeded");
            let spawner = Arc::new(FeedWorkerSpawner {
                registry: Arc::clone(&registry),
                source,
                store: Arc::clone(&store),
                settings: cfg.pipeline.clone(),
                run_flag: run_flag.clone(),
            });
            let supervisor = Supervisor::new(
                spawner,
                Arc::clone(&registry),
                run_flag.clone(),
                cfg.pipeline.supervisor_poll,
            );
            Some(supervisor.start())
        }
        Err(e) => {
            tracing::error!(
                backend = source.name(),
                error = %e,
                "Snapshot source probe failed, acquisition disabled"
            );
            run_flag.stop();
            None
        }
    };

    let state = AppState {
        query: QueryGateway::new(Arc::clone(&registry), store, cfg.api_debug),
        registry,
        limiter: Arc::new(RateLimiter::new(cfg.rate_limit.clone())),
        run_flag: run_flag.clone(),
        health: HealthThresholds {
            stale_after: cfg.pipeline.stale_after,
            poll_interval: cfg.pipeline.supervisor_poll,
        },
    };

    // Build app from routes gateway (EMBP)
    let app: Router = routes::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    run_flag.stop();
    if let Some(handle) = supervisor {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Supervisor ended abnormally");
        }
    }
    tracing::info!("Shutdown complete");

    Ok(())
}

// ---

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    // ---
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `APP_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level from `RUST_LOG`, else `APP_LOG_LEVEL` (default `debug`)
///
/// Call once at startup, before any logging macros are invoked.
fn init_tracing() {
    // ---
    let span_events = match env::var("APP_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("APP_LOG_LEVEL").ok().as_deref() {
            Some(level @ ("trace" | "debug" | "info" | "warn" | "error")) => level.to_string(),
            _ => "debug".to_string(),
        };
        EnvFilter::new(format!("{level},sqlx::query=warn,hyper=info,reqwest=info"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
