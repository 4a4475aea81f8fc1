//! Playback Controller
//!
//! Explicit state machine driving one device's playback of one profile:
//!
//! ```text
//! Idle → Loading → Playing ⇄ Fallback (muted)
//!                     ↓
//!                 EndReached → Refreshing → Playing (loop)
//!                                         → Stalled (empty playlist)
//! Loading / Refreshing → Error
//! Playing / Fallback → Failed (muted play also rejected)
//! any → Closed
//! ```
//!
//! The controller never gives up on transient network trouble: a failed or
//! slow refresh loops the playlist it already has. Only an empty playlist
//! (Stalled) or a profile that no longer exists (Error) stop playback.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use vloop_common::{EnrichedProfile, Video};

use crate::error::PlayerError;
use crate::source::ProfileSource;
use crate::surface::VideoSurface;

/// Why loading or refreshing a profile ended in [`PlaybackState::Error`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    ProfileNotFound,
    Network(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackState {
    /// No profile loaded
    Idle,
    Loading,
    Playing,
    /// Playing muted because sound was refused; waiting for an interaction
    Fallback,
    EndReached,
    Refreshing,
    /// The playlist is empty; nothing to play
    Stalled,
    Error(LoadError),
    /// Even muted playback was refused; retried on the next interaction
    Failed,
    /// Session torn down; terminal
    Closed,
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing | PlaybackState::Fallback)
    }
}

/// Point-in-time view of a controller for observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSnapshot {
    pub state: PlaybackState,
    pub profile_id: Option<String>,
    pub current_index: usize,
    pub current_video: Option<String>,
    pub muted: bool,
    /// Ask the viewer to interact so sound can be restored
    pub unmute_prompt: bool,
    /// The profile is gone; the surrounding UI should offer profile selection
    pub redirect_to_selection: bool,
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        Self {
            state: PlaybackState::Idle,
            profile_id: None,
            current_index: 0,
            current_video: None,
            muted: false,
            unmute_prompt: false,
            redirect_to_selection: false,
        }
    }
}

pub struct PlaybackController {
    source: Arc<dyn ProfileSource>,
    surface: Arc<dyn VideoSurface>,
    refresh_timeout: Duration,
    state: PlaybackState,
    profile: Option<EnrichedProfile>,
    index: usize,
    muted: bool,
    unmute_prompt: bool,
    redirect_to_selection: bool,
    /// Name passed to the last `start`, for retrying a failed load
    requested_name: Option<String>,
}

impl PlaybackController {
    pub fn new(
        source: Arc<dyn ProfileSource>,
        surface: Arc<dyn VideoSurface>,
        refresh_timeout: Duration,
    ) -> Self {
        Self {
            source,
            surface,
            refresh_timeout,
            state: PlaybackState::Idle,
            profile: None,
            index: 0,
            muted: false,
            unmute_prompt: false,
            redirect_to_selection: false,
            requested_name: None,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn playlist(&self) -> &[Video] {
        self.profile.as_ref().map(|p| p.videos.as_slice()).unwrap_or(&[])
    }

    pub fn current_video(&self) -> Option<&Video> {
        self.playlist().get(self.index)
    }

    pub fn unmute_prompt(&self) -> bool {
        self.unmute_prompt
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            state: self.state.clone(),
            profile_id: self.profile.as_ref().map(|p| p.id().to_string()),
            current_index: self.index,
            current_video: self.current_video().map(|v| v.id.clone()),
            muted: self.muted,
            unmute_prompt: self.unmute_prompt,
            redirect_to_selection: self.redirect_to_selection,
        }
    }

    fn is_closed(&self) -> bool {
        self.state == PlaybackState::Closed
    }

    fn transition(&mut self, next: PlaybackState) {
        if self.state != next {
            debug!("Playback state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    fn fail_load(&mut self, err: PlayerError) {
        match err {
            PlayerError::NotFound(what) => {
                warn!("Profile {} not found; returning to selection", what);
                self.redirect_to_selection = true;
                self.transition(PlaybackState::Error(LoadError::ProfileNotFound));
            }
            other => {
                error!("Failed to load profile: {}", other);
                self.transition(PlaybackState::Error(LoadError::Network(other.to_string())));
            }
        }
    }

    /// Resolve `name`, fetch its playlist and start from the first video
    pub async fn start(&mut self, name: &str) {
        if self.is_closed() {
            return;
        }
        self.transition(PlaybackState::Loading);
        self.redirect_to_selection = false;
        self.requested_name = Some(name.to_string());

        let summary = match self.source.profile_by_name(name).await {
            Ok(profile) => profile,
            Err(err) => return self.fail_load(err),
        };
        let profile = match self.source.profile(&summary.id).await {
            Ok(profile) => profile,
            Err(err) => return self.fail_load(err),
        };

        info!(
            "Loaded profile '{}' ({} videos)",
            profile.name(),
            profile.videos.len()
        );
        self.profile = Some(profile);
        self.index = 0;
        self.send_heartbeat().await;

        if self.playlist().is_empty() {
            info!("Playlist is empty; waiting for content");
            self.transition(PlaybackState::Stalled);
        } else {
            self.play_current().await;
        }
    }

    /// Play the video at the current index. Tries with sound unless the
    /// session is already muted, then falls back to muted.
    async fn play_current(&mut self) {
        let Some(video) = self.current_video().cloned() else {
            self.transition(PlaybackState::Stalled);
            return;
        };

        if !self.muted {
            match self.surface.play(&video, false).await {
                Ok(()) => {
                    self.unmute_prompt = false;
                    self.transition(PlaybackState::Playing);
                    return;
                }
                Err(err) => warn!("Playback with sound refused ({}); retrying muted", err),
            }
        }

        match self.surface.play(&video, true).await {
            Ok(()) => {
                self.muted = true;
                self.unmute_prompt = true;
                self.transition(PlaybackState::Fallback);
            }
            Err(err) => {
                error!("Muted playback of {} also failed: {}", video.original_name, err);
                self.transition(PlaybackState::Failed);
            }
        }
    }

    /// The current video reached its natural end
    pub async fn on_video_ended(&mut self) {
        if !self.state.is_playing() {
            debug!("Ignoring video end in state {:?}", self.state);
            return;
        }

        if self.index + 1 < self.playlist().len() {
            self.index += 1;
            self.play_current().await;
        } else {
            self.transition(PlaybackState::EndReached);
            self.refresh().await;
        }
    }

    /// Re-fetch the profile after the last video, bounded by the refresh
    /// watchdog
    async fn refresh(&mut self) {
        let Some(id) = self.profile.as_ref().map(|p| p.id().to_string()) else {
            return;
        };
        self.transition(PlaybackState::Refreshing);

        let fetched = match timeout(self.refresh_timeout, self.source.profile(&id)).await {
            Ok(result) => result,
            Err(_) => Err(PlayerError::Timeout(self.refresh_timeout)),
        };

        match fetched {
            Ok(updated) => {
                let empty = updated.videos.is_empty();
                self.profile = Some(updated);
                self.index = 0;
                if empty {
                    info!("Playlist became empty after refresh");
                    self.transition(PlaybackState::Stalled);
                } else {
                    self.play_current().await;
                }
            }
            Err(PlayerError::NotFound(_)) => {
                self.fail_load(PlayerError::NotFound(id));
                self.surface.stop().await;
            }
            Err(err) => {
                warn!("Playlist refresh failed ({}); looping previous playlist", err);
                self.index = 0;
                self.play_current().await;
            }
        }
    }

    /// While stalled, check whether the operator has added videos
    pub async fn retry_stalled(&mut self) {
        if self.state == PlaybackState::Stalled {
            self.refresh().await;
        }
    }

    /// After a network failure while loading, try the same profile again
    pub async fn retry_load(&mut self) {
        if !matches!(self.state, PlaybackState::Error(LoadError::Network(_))) {
            return;
        }
        if let Some(name) = self.requested_name.clone() {
            info!("Retrying load of profile '{}'", name);
            self.start(&name).await;
        }
    }

    /// The viewer touched the device: restore sound, resume (or retry a
    /// failed start) and try to go fullscreen
    pub async fn on_user_interaction(&mut self) {
        if self.is_closed() {
            return;
        }

        match self.state {
            PlaybackState::Fallback => {
                self.muted = false;
                self.unmute_prompt = false;
                self.surface.set_muted(false).await;
                match self.surface.resume().await {
                    Ok(()) => self.transition(PlaybackState::Playing),
                    Err(err) => {
                        // Nothing is showing; start the current video over
                        warn!("Resume after unmute failed ({}); restarting video", err);
                        self.play_current().await;
                    }
                }
            }
            PlaybackState::Failed => {
                self.muted = false;
                self.unmute_prompt = false;
                self.play_current().await;
            }
            _ => {}
        }

        if !self.surface.is_fullscreen() {
            if let Err(err) = self.surface.set_fullscreen(true).await {
                debug!("Fullscreen denied: {}", err);
            }
        }
    }

    /// Flip fullscreen without touching playback
    pub async fn toggle_fullscreen(&mut self) {
        if self.is_closed() {
            return;
        }
        let target = !self.surface.is_fullscreen();
        if let Err(err) = self.surface.set_fullscreen(target).await {
            debug!("Fullscreen change denied: {}", err);
        }
    }

    /// Best-effort liveness report; failures never affect playback
    pub async fn send_heartbeat(&self) {
        if self.is_closed() || matches!(self.state, PlaybackState::Error(_)) {
            return;
        }
        let Some(profile) = &self.profile else {
            return;
        };
        if let Err(err) = self.source.heartbeat(profile.id()).await {
            warn!("Heartbeat failed: {}", err);
        }
    }

    /// Tear down: stop the surface and refuse every later event
    pub async fn close(&mut self) {
        if self.is_closed() {
            return;
        }
        self.surface.stop().await;
        self.unmute_prompt = false;
        self.transition(PlaybackState::Closed);
        info!("Playback session closed");
    }
}
