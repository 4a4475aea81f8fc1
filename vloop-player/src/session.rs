//! Playback session runner
//!
//! One [`PlayerSession`] owns one [`PlaybackController`] on its own task and
//! feeds it, one at a time, the commands arriving on its channel plus a
//! periodic heartbeat tick. Shutdown cancels whatever step is in flight,
//! closes the controller and stops the timers; a session is not reused.

use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::controller::{PlaybackController, PlayerSnapshot};

/// Events delivered to a running session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    VideoEnded,
    UserInteraction,
    ToggleFullscreen,
}

/// Cloneable sender side of a session's command channel
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    /// Create the channel before the session so surfaces can hold a handle
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, command: SessionCommand) {
        if let Err(mpsc::error::SendError(command)) = self.tx.send(command) {
            debug!("Session closed; dropping {:?}", command);
        }
    }

    pub fn video_ended(&self) {
        self.send(SessionCommand::VideoEnded);
    }

    pub fn user_interaction(&self) {
        self.send(SessionCommand::UserInteraction);
    }

    pub fn toggle_fullscreen(&self) {
        self.send(SessionCommand::ToggleFullscreen);
    }
}

/// Floor for the heartbeat period; `interval` rejects zero
const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub profile_name: String,
    pub heartbeat_interval: Duration,
}

enum Step {
    Command(SessionCommand),
    Tick,
}

pub struct PlayerSession {
    handle: SessionHandle,
    cancel: CancellationToken,
    snapshots: watch::Receiver<PlayerSnapshot>,
    task: Option<JoinHandle<()>>,
}

impl PlayerSession {
    /// Start the session task. `commands` must be the receiver paired with
    /// `handle`.
    pub fn spawn(
        controller: PlaybackController,
        handle: SessionHandle,
        commands: mpsc::UnboundedReceiver<SessionCommand>,
        config: SessionConfig,
    ) -> Self {
        let cancel = CancellationToken::new();
        let (snapshot_tx, snapshots) = watch::channel(controller.snapshot());
        let task = tokio::spawn(run(controller, commands, config, cancel.clone(), snapshot_tx));

        Self {
            handle,
            cancel,
            snapshots,
            task: Some(task),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Latest published controller state
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlayerSnapshot> {
        self.snapshots.clone()
    }

    /// Cancel timers and any in-flight step, close the controller and wait
    /// for the task to finish
    pub async fn shutdown(mut self) -> PlayerSnapshot {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Playback session task failed: {}", e);
            }
        }
        self.snapshot()
    }
}

impl Drop for PlayerSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn publish(snapshots: &watch::Sender<PlayerSnapshot>, controller: &PlaybackController) {
    snapshots.send_replace(controller.snapshot());
}

async fn apply(controller: &mut PlaybackController, step: Step) {
    match step {
        Step::Command(SessionCommand::VideoEnded) => controller.on_video_ended().await,
        Step::Command(SessionCommand::UserInteraction) => controller.on_user_interaction().await,
        Step::Command(SessionCommand::ToggleFullscreen) => controller.toggle_fullscreen().await,
        Step::Tick => {
            controller.send_heartbeat().await;
            controller.retry_stalled().await;
            controller.retry_load().await;
        }
    }
}

async fn run(
    mut controller: PlaybackController,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    config: SessionConfig,
    cancel: CancellationToken,
    snapshots: watch::Sender<PlayerSnapshot>,
) {
    let started = tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = controller.start(&config.profile_name) => true,
    };
    publish(&snapshots, &controller);

    if started {
        let period = config.heartbeat_interval.max(MIN_HEARTBEAT_INTERVAL);
        let mut heartbeat = tokio::time::interval(period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick is immediate; loading already reported once
        heartbeat.tick().await;

        loop {
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => Step::Command(command),
                    None => break,
                },
                _ = heartbeat.tick() => Step::Tick,
            };

            let finished = tokio::select! {
                biased;
                _ = cancel.cancelled() => false,
                _ = apply(&mut controller, step) => true,
            };
            publish(&snapshots, &controller);
            if !finished {
                break;
            }
        }
    }

    controller.close().await;
    publish(&snapshots, &controller);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::PlaybackState;
    use crate::surface::VideoSurface;
    use crate::testing::{FakeSource, FakeSurface};
    use std::sync::Arc;

    const HEARTBEAT: Duration = Duration::from_secs(30);

    fn spawn_session(source: &Arc<FakeSource>, surface: &Arc<FakeSurface>) -> PlayerSession {
        let controller =
            PlaybackController::new(source.clone(), surface.clone(), Duration::from_secs(10));
        let (handle, commands) = SessionHandle::channel();
        PlayerSession::spawn(
            controller,
            handle,
            commands,
            SessionConfig {
                profile_name: "Lobby".to_string(),
                heartbeat_interval: HEARTBEAT,
            },
        )
    }

    async fn wait_until<F>(session: &PlayerSession, predicate: F) -> PlayerSnapshot
    where
        F: FnMut(&PlayerSnapshot) -> bool,
    {
        let mut rx = session.subscribe();
        let snapshot = rx.wait_for(predicate).await.unwrap().clone();
        snapshot
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_after_load_then_every_interval() {
        let source = Arc::new(FakeSource::with_profile("Lobby", &["a"]));
        let surface = Arc::new(FakeSurface::default());
        let session = spawn_session(&source, &surface);

        wait_until(&session, |s| s.state == PlaybackState::Playing).await;
        assert_eq!(source.heartbeat_count(), 1);

        tokio::time::sleep(Duration::from_secs(65)).await;
        assert_eq!(source.heartbeat_count(), 3);

        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_drive_the_controller() {
        let source = Arc::new(FakeSource::with_profile("Lobby", &["a", "b", "c"]));
        let surface = Arc::new(FakeSurface::default());
        let session = spawn_session(&source, &surface);
        wait_until(&session, |s| s.state == PlaybackState::Playing).await;

        let handle = session.handle();
        handle.video_ended();
        handle.video_ended();
        let snapshot = wait_until(&session, |s| s.current_index == 2).await;
        assert_eq!(snapshot.current_video.as_deref(), Some("c"));

        handle.toggle_fullscreen();
        handle.user_interaction();
        wait_until(&session, |_| surface.is_fullscreen()).await;

        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_failures_keep_playing() {
        let source = Arc::new(FakeSource::with_profile("Lobby", &["a"]));
        source.set_heartbeat_fails(true);
        let surface = Arc::new(FakeSurface::default());
        let session = spawn_session(&source, &surface);
        wait_until(&session, |s| s.state == PlaybackState::Playing).await;

        tokio::time::sleep(Duration::from_secs(95)).await;

        assert_eq!(source.heartbeat_count(), 4);
        assert_eq!(session.snapshot().state, PlaybackState::Playing);
        assert_eq!(surface.plays().len(), 1);
        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_heartbeat_interval_still_runs_and_closes() {
        let source = Arc::new(FakeSource::with_profile("Lobby", &["a"]));
        let surface = Arc::new(FakeSurface::default());
        let controller =
            PlaybackController::new(source.clone(), surface.clone(), Duration::from_secs(10));
        let (handle, commands) = SessionHandle::channel();
        let session = PlayerSession::spawn(
            controller,
            handle,
            commands,
            SessionConfig {
                profile_name: "Lobby".to_string(),
                heartbeat_interval: Duration::ZERO,
            },
        );
        wait_until(&session, |s| s.state == PlaybackState::Playing).await;

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(source.heartbeat_count(), 3);

        let last = session.shutdown().await;
        assert_eq!(last.state, PlaybackState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_all_transitions() {
        let source = Arc::new(FakeSource::with_profile("Lobby", &["a", "b"]));
        let surface = Arc::new(FakeSurface::default());
        let session = spawn_session(&source, &surface);
        wait_until(&session, |s| s.state == PlaybackState::Playing).await;
        let handle = session.handle();

        let last = session.shutdown().await;
        assert_eq!(last.state, PlaybackState::Closed);
        assert!(surface.is_stopped());

        let plays = surface.plays().len();
        let beats = source.heartbeat_count();
        handle.video_ended();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(surface.plays().len(), plays);
        assert_eq!(source.heartbeat_count(), beats);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_hanging_refresh() {
        let source = Arc::new(FakeSource::with_profile("Lobby", &["a"]));
        let surface = Arc::new(FakeSurface::default());
        let session = spawn_session(&source, &surface);
        wait_until(&session, |s| s.state == PlaybackState::Playing).await;

        source.set_fetch_hangs(true);
        session.handle().video_ended();
        tokio::task::yield_now().await;

        let last = session.shutdown().await;
        assert_eq!(last.state, PlaybackState::Closed);
    }
}
