//! Video surfaces
//!
//! A [`VideoSurface`] is whatever actually shows the video. The controller
//! only asks it to play, mute, resume and change fullscreen; natural end of a
//! video comes back through the session's command channel.

use async_trait::async_trait;
use reqwest::Url;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};
use vloop_common::config::PlayerConfig;
use vloop_common::Video;

use crate::error::PlayError;
use crate::session::SessionHandle;
use crate::source::endpoint;

#[async_trait]
pub trait VideoSurface: Send + Sync {
    /// Start `video` from the beginning, replacing whatever is showing
    async fn play(&self, video: &Video, muted: bool) -> Result<(), PlayError>;

    async fn set_muted(&self, muted: bool);

    /// Continue the current video
    async fn resume(&self) -> Result<(), PlayError>;

    fn is_fullscreen(&self) -> bool;

    async fn set_fullscreen(&self, fullscreen: bool) -> Result<(), PlayError>;

    /// Stop showing anything; no end-of-video events follow
    async fn stop(&self);
}

/// Wait before reporting the end of a video whose player exited with an
/// error, so a broken player command cannot spin through the playlist
const FAILED_EXIT_BACKOFF: Duration = Duration::from_secs(1);

struct Running {
    video: Video,
    muted: bool,
    stop_tx: oneshot::Sender<()>,
}

/// Plays each video by launching an external player process (mpv by
/// default) on the file's upload URL. The child exiting on its own is the
/// end of the video.
pub struct ProcessSurface {
    command: String,
    args: Vec<String>,
    mute_arg: String,
    fullscreen_arg: String,
    media_base: Url,
    events: SessionHandle,
    /// Bumped on every launch and stop; exits of older children are ignored
    generation: Arc<AtomicU64>,
    running: Mutex<Option<Running>>,
    fullscreen: AtomicBool,
}

impl ProcessSurface {
    pub fn new(config: &PlayerConfig, media_base: Url, events: SessionHandle) -> Self {
        Self {
            command: config.player_command.clone(),
            args: config.player_args.clone(),
            mute_arg: config.mute_arg.clone(),
            fullscreen_arg: config.fullscreen_arg.clone(),
            media_base,
            events,
            generation: Arc::new(AtomicU64::new(0)),
            running: Mutex::new(None),
            fullscreen: AtomicBool::new(true),
        }
    }

    fn build_command(&self, url: &Url, muted: bool) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args);
        if self.fullscreen.load(Ordering::SeqCst) && !self.fullscreen_arg.is_empty() {
            cmd.arg(&self.fullscreen_arg);
        }
        if muted && !self.mute_arg.is_empty() {
            cmd.arg(&self.mute_arg);
        }
        cmd.arg(url.as_str())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl VideoSurface for ProcessSurface {
    async fn play(&self, video: &Video, muted: bool) -> Result<(), PlayError> {
        let url = endpoint(&self.media_base, &["uploads", &video.filename])
            .map_err(|e| PlayError::Failed(e.to_string()))?;

        let mut running = self.running.lock().await;
        if let Some(previous) = running.take() {
            let _ = previous.stop_tx.send(());
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let mut child = self
            .build_command(&url, muted)
            .spawn()
            .map_err(|e| PlayError::Failed(format!("cannot start {}: {}", self.command, e)))?;
        info!("Playing {} ({}){}", video.original_name, url, if muted { " muted" } else { "" });

        let (stop_tx, stop_rx) = oneshot::channel();
        let events = self.events.clone();
        let current = Arc::clone(&self.generation);
        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    match status {
                        Ok(status) if status.success() => debug!("Player exited"),
                        Ok(status) => {
                            warn!("Player exited with {}", status);
                            tokio::time::sleep(FAILED_EXIT_BACKOFF).await;
                        }
                        Err(e) => {
                            warn!("Lost track of player process: {}", e);
                            tokio::time::sleep(FAILED_EXIT_BACKOFF).await;
                        }
                    }
                    if current.load(Ordering::SeqCst) == generation {
                        events.video_ended();
                    }
                }
                _ = stop_rx => {
                    if let Err(e) = child.kill().await {
                        debug!("Player already gone: {}", e);
                    }
                }
            }
        });

        *running = Some(Running {
            video: video.clone(),
            muted,
            stop_tx,
        });
        Ok(())
    }

    /// A running process cannot change its mute flag, so the current video
    /// restarts with the new setting
    async fn set_muted(&self, muted: bool) {
        let relaunch = {
            let running = self.running.lock().await;
            running
                .as_ref()
                .filter(|r| r.muted != muted)
                .map(|r| r.video.clone())
        };
        if let Some(video) = relaunch {
            if let Err(e) = self.play(&video, muted).await {
                warn!("Could not restart {} with mute={}: {}", video.original_name, muted, e);
            }
        }
    }

    async fn resume(&self) -> Result<(), PlayError> {
        if self.running.lock().await.is_some() {
            Ok(())
        } else {
            Err(PlayError::Failed("nothing is playing".to_string()))
        }
    }

    fn is_fullscreen(&self) -> bool {
        self.fullscreen.load(Ordering::SeqCst)
    }

    /// Takes effect from the next launch; the current video keeps playing
    async fn set_fullscreen(&self, fullscreen: bool) -> Result<(), PlayError> {
        self.fullscreen.store(fullscreen, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(running) = self.running.lock().await.take() {
            let _ = running.stop_tx.send(());
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::session::SessionCommand;
    use crate::testing::video;
    use tokio::time::timeout;

    fn surface(
        command: &str,
        args: &[&str],
    ) -> (ProcessSurface, tokio::sync::mpsc::UnboundedReceiver<SessionCommand>) {
        let (handle, commands) = SessionHandle::channel();
        let config = PlayerConfig {
            player_command: command.to_string(),
            player_args: args.iter().map(|a| a.to_string()).collect(),
            ..PlayerConfig::default()
        };
        let base = Url::parse("http://127.0.0.1:3000").unwrap();
        (ProcessSurface::new(&config, base, handle), commands)
    }

    #[tokio::test]
    async fn test_natural_exit_reports_video_ended() {
        let (surface, mut commands) = surface("true", &[]);
        surface.play(&video("a"), false).await.unwrap();

        let command = timeout(Duration::from_secs(5), commands.recv()).await.unwrap();
        assert!(matches!(command, Some(SessionCommand::VideoEnded)));
    }

    #[tokio::test]
    async fn test_stopped_player_reports_nothing() {
        let (surface, mut commands) = surface("sh", &["-c", "sleep 5", "vloop"]);
        surface.play(&video("a"), false).await.unwrap();
        surface.stop().await;

        assert!(timeout(Duration::from_millis(300), commands.recv()).await.is_err());
        assert!(surface.resume().await.is_err());
    }

    #[tokio::test]
    async fn test_missing_command_fails_to_play() {
        let (surface, _commands) = surface("/nonexistent/vloop-test-player", &[]);
        let err = surface.play(&video("a"), false).await.unwrap_err();
        assert!(matches!(err, PlayError::Failed(_)));
    }

    #[tokio::test]
    async fn test_fullscreen_toggle_is_idempotent() {
        let (surface, _commands) = surface("true", &[]);
        assert!(surface.is_fullscreen());
        surface.set_fullscreen(false).await.unwrap();
        surface.set_fullscreen(false).await.unwrap();
        assert!(!surface.is_fullscreen());
    }
}
