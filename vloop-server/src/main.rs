//! vloop-server - Main entry point
//!
//! Hosts the video library and profile API that operators edit and playback
//! devices poll.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vloop_common::config::{RootFolderInitializer, RootFolderResolver, StoreBackend, TomlConfig};
use vloop_server::{build_router, store, AppState, MediaStore, ProfileService};

/// Command-line arguments for vloop-server
#[derive(Parser, Debug)]
#[command(name = "vloop-server")]
#[command(about = "Video library and profile server for looping playback devices")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "VLOOP_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder holding the database and uploads
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Address to bind (overrides [server] host)
    #[arg(long, env = "VLOOP_HOST")]
    host: Option<String>,

    /// Port to listen on (overrides [server] port)
    #[arg(short, long, env = "VLOOP_PORT")]
    port: Option<u16>,

    /// Persistence backend: sqlite or json (overrides [server] store_backend)
    #[arg(long, env = "VLOOP_STORE")]
    store: Option<StoreBackend>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (config, config_source) = TomlConfig::load_quietly(args.config.as_deref());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting vloop-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    config_source.log();

    let root_folder = RootFolderResolver::new("vloop-server")
        .with_cli_arg(args.root_folder)
        .with_toml(&config)
        .resolve();
    let layout = RootFolderInitializer::new(root_folder);
    layout
        .ensure_directory_exists()
        .context("Failed to create root folder")?;
    info!("Root folder: {}", layout.root().display());

    let backend = args.store.unwrap_or(config.server.store_backend);
    let entity_store = store::open_store(backend, &layout)
        .await
        .context("Failed to open entity store")?;

    let state = AppState::new(
        ProfileService::new(entity_store),
        MediaStore::new(layout.uploads_path()),
    );
    let app = build_router(state, config.server.max_upload_bytes);

    let host = args.host.unwrap_or(config.server.host);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
