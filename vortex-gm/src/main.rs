//! vortex-gm - Gamification metrics and ranking service
//!
//! Startup order: bootstrap TOML, tracing, database, runtime settings,
//! periodic rank refresh, HTTP server.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vortex_common::catalog;
use vortex_common::config::{resolve_database_path, resolve_root_folder, TomlConfig};
use vortex_common::db::init_database;
use vortex_gm::config::RuntimeSettings;
use vortex_gm::services::refresh::spawn_rank_refresh;
use vortex_gm::{build_router, AppState};

/// Command-line arguments for vortex-gm
#[derive(Parser, Debug)]
#[command(name = "vortex-gm")]
#[command(about = "Gamification metrics and ranking service for VORTEX")]
#[command(version)]
struct Args {
    /// Bootstrap TOML file (default: platform config locations)
    #[arg(short, long, env = "VORTEX_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides TOML)
    #[arg(short, long, env = "VORTEX_GM_PORT")]
    port: Option<u16>,

    /// Root folder holding the database
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Database file (overrides root folder and TOML)
    #[arg(short, long, env = "VORTEX_DATABASE")]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config =
        TomlConfig::load(args.config.as_deref()).context("Failed to load bootstrap configuration")?;

    // RUST_LOG wins over the TOML level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},tower_http=info", toml_config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting VORTEX Gamification Metrics (vortex-gm) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    for deviation in catalog::validate_weights() {
        warn!(
            scope = %deviation.scope,
            sum = deviation.sum,
            "Catalog weights do not sum to 1.0"
        );
    }

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    let db_path = resolve_database_path(args.database.as_deref(), &root_folder, &toml_config);
    info!("Root folder: {}", root_folder.display());
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let settings = RuntimeSettings::load(&pool)
        .await
        .context("Failed to load runtime settings")?;

    let state = AppState::new(pool, settings.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let refresh = match settings.rank_refresh_interval() {
        Some(period) => Some(spawn_rank_refresh(Arc::clone(&state.engine), period, shutdown_rx)),
        None => {
            info!("Periodic rank refresh disabled");
            None
        }
    };

    let app = build_router(state);

    let port = args.port.unwrap_or(toml_config.port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);
    info!("Health check: http://127.0.0.1:{}/health", port);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = refresh {
        if let Err(e) = handle.await {
            warn!("Rank refresh task ended abnormally: {}", e);
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
