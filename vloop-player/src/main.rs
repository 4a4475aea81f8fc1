//! vloop-player - playback device entry point
//!
//! Loops one profile's videos through an external player until stopped.
//! Without a profile name, or when the profile is deleted while playing, the
//! server's profiles are listed on stdout for the viewer to pick from.
//! While playing, stdin lines are viewer input: Enter counts as an
//! interaction (restores sound), `f` toggles fullscreen, `q` quits.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vloop_common::config::{PlayerConfig, TomlConfig};
use vloop_player::{
    choose_profile, HttpProfileSource, PlaybackController, PlayerSession, ProcessSurface,
    Selection, SessionConfig, SessionHandle,
};

/// Command-line arguments for vloop-player
#[derive(Parser, Debug)]
#[command(name = "vloop-player")]
#[command(about = "Loop a vloop profile's videos on this device")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "VLOOP_CONFIG")]
    config: Option<PathBuf>,

    /// Server base URL (overrides [player] server_url)
    #[arg(short, long, env = "VLOOP_SERVER_URL")]
    server: Option<String>,

    /// Profile name to play (overrides [player] profile); omit to choose
    /// from the server's list
    #[arg(short, long, env = "VLOOP_PROFILE")]
    profile: Option<String>,

    /// External player command (overrides [player] player_command)
    #[arg(long)]
    player_command: Option<String>,
}

/// Wait before asking the server for its profiles again
const SELECTION_RETRY: Duration = Duration::from_secs(10);

type ViewerInput = Lines<BufReader<Stdin>>;

/// How a playback session ended
enum SessionEnd {
    Exit,
    ProfileGone,
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

    info!("Starting vloop-player v{}", env!("CARGO_PKG_VERSION"));
    config_source.log();

    let mut player = config.player;
    if let Some(command) = args.player_command {
        player.player_command = command;
    }
    player.validate().context("Invalid player configuration")?;
    let server_url = args.server.unwrap_or_else(|| player.server_url.clone());
    let refresh_timeout = Duration::from_secs(player.refresh_timeout_secs);

    let source = Arc::new(
        HttpProfileSource::new(&server_url, refresh_timeout)
            .context("Failed to create server client")?,
    );
    let mut input: ViewerInput = BufReader::new(tokio::io::stdin()).lines();
    let mut requested = args.profile.or_else(|| player.profile.clone());

    loop {
        let profile_name = match requested.take() {
            Some(name) => name,
            None => {
                let selected = tokio::select! {
                    _ = shutdown_signal() => return Ok(()),
                    selected = select_profile(source.as_ref(), &mut input) => selected,
                };
                match selected? {
                    Some(name) => name,
                    None => return Ok(()),
                }
            }
        };

        info!("Playing profile '{}' from {}", profile_name, server_url);
        match play_profile(&player, &source, &profile_name, &mut input).await {
            SessionEnd::Exit => return Ok(()),
            SessionEnd::ProfileGone => {
                warn!("Profile '{}' no longer exists on {}", profile_name, server_url);
            }
        }
    }
}

/// Ask the viewer for a profile until one is chosen. `None` when the viewer
/// has no terminal to answer from.
async fn select_profile(
    source: &HttpProfileSource,
    input: &mut ViewerInput,
) -> Result<Option<String>> {
    let mut out = tokio::io::stdout();
    loop {
        match choose_profile(source, input, &mut out).await {
            Ok(Selection::Chosen(name)) => return Ok(Some(name)),
            Ok(Selection::NoInput) => {
                return Err(anyhow!(
                    "No profile configured and no terminal to choose one; pass --profile"
                ))
            }
            Ok(Selection::NoProfiles) => {
                info!("Waiting for the operator to create a profile");
            }
            Err(e) => warn!("Cannot list profiles: {}", e),
        }
        tokio::time::sleep(SELECTION_RETRY).await;
    }
}

/// Run one session until quit, a signal, or the profile disappearing
async fn play_profile(
    player: &PlayerConfig,
    source: &Arc<HttpProfileSource>,
    profile_name: &str,
    input: &mut ViewerInput,
) -> SessionEnd {
    let refresh_timeout = Duration::from_secs(player.refresh_timeout_secs);
    let (handle, commands) = SessionHandle::channel();
    let surface = ProcessSurface::new(player, source.base_url().clone(), handle.clone());
    let controller = PlaybackController::new(source.clone(), Arc::new(surface), refresh_timeout);

    let session = PlayerSession::spawn(
        controller,
        handle,
        commands,
        SessionConfig {
            profile_name: profile_name.to_string(),
            heartbeat_interval: Duration::from_secs(player.heartbeat_interval_secs),
        },
    );

    let mut snapshots = session.subscribe();
    let end = tokio::select! {
        _ = shutdown_signal() => SessionEnd::Exit,
        _ = read_viewer_input(session.handle(), input) => {
            info!("Quit requested");
            SessionEnd::Exit
        }
        _ = snapshots.wait_for(|s| s.redirect_to_selection) => SessionEnd::ProfileGone,
    };

    let last = session.shutdown().await;
    info!("Player stopped ({:?})", last.state);
    end
}

/// Forward viewer key presses to the session. Returns on `q`.
async fn read_viewer_input(handle: SessionHandle, input: &mut ViewerInput) {
    loop {
        match input.next_line().await {
            Ok(Some(line)) => match line.trim() {
                "q" | "quit" => return,
                "f" => handle.toggle_fullscreen(),
                _ => handle.user_interaction(),
            },
            // No terminal attached (service mode); keep playing
            Ok(None) => std::future::pending::<()>().await,
            Err(e) => {
                warn!("Cannot read viewer input: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
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
