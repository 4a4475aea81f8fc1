//! In-memory collaborators for controller and session tests

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use vloop_common::{EnrichedProfile, Profile, Video};

use crate::error::{PlayError, PlayerError, Result};
use crate::source::ProfileSource;
use crate::surface::VideoSurface;

pub fn video(id: &str) -> Video {
    Video {
        id: id.to_string(),
        filename: format!("{}.mp4", id),
        original_name: format!("{}.mp4", id),
        size: 1,
        uploaded_at: Utc::now(),
    }
}

fn profile_id(name: &str) -> String {
    format!("id-{}", name)
}

/// Server stand-in: profiles by name, each with a playlist of fake videos
#[derive(Default)]
pub struct FakeSource {
    playlists: Mutex<HashMap<String, Vec<String>>>,
    fetch_fails: AtomicBool,
    fetch_hangs: AtomicBool,
    heartbeat_fails: AtomicBool,
    fetches: AtomicUsize,
    heartbeats: AtomicUsize,
}

impl FakeSource {
    pub fn with_profile(name: &str, videos: &[&str]) -> Self {
        let source = Self::default();
        source.set_videos(name, videos);
        source
    }

    pub fn set_videos(&self, name: &str, videos: &[&str]) {
        self.playlists.lock().unwrap().insert(
            name.to_string(),
            videos.iter().map(|v| v.to_string()).collect(),
        );
    }

    pub fn remove_profile(&self, name: &str) {
        self.playlists.lock().unwrap().remove(name);
    }

    pub fn set_fetch_fails(&self, fails: bool) {
        self.fetch_fails.store(fails, Ordering::SeqCst);
    }

    /// Playlist fetches never complete
    pub fn set_fetch_hangs(&self, hangs: bool) {
        self.fetch_hangs.store(hangs, Ordering::SeqCst);
    }

    pub fn set_heartbeat_fails(&self, fails: bool) {
        self.heartbeat_fails.store(fails, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn heartbeat_count(&self) -> usize {
        self.heartbeats.load(Ordering::SeqCst)
    }

    fn lookup(&self, id: &str) -> Option<Profile> {
        self.playlists
            .lock()
            .unwrap()
            .iter()
            .find(|(name, _)| profile_id(name) == id)
            .map(|(name, ids)| Profile {
                id: profile_id(name),
                name: name.clone(),
                video_ids: ids.clone(),
                last_seen: None,
            })
    }
}

#[async_trait]
impl ProfileSource for FakeSource {
    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        if self.fetch_fails.load(Ordering::SeqCst) {
            return Err(PlayerError::Network("connection refused".to_string()));
        }
        let names: Vec<String> = self.playlists.lock().unwrap().keys().cloned().collect();
        let mut profiles: Vec<Profile> = names
            .iter()
            .filter_map(|name| self.lookup(&profile_id(name)))
            .collect();
        profiles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(profiles)
    }

    async fn profile_by_name(&self, name: &str) -> Result<Profile> {
        if self.fetch_fails.load(Ordering::SeqCst) {
            return Err(PlayerError::Network("connection refused".to_string()));
        }
        self.lookup(&profile_id(name))
            .ok_or_else(|| PlayerError::NotFound(name.to_string()))
    }

    async fn profile(&self, id: &str) -> Result<EnrichedProfile> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fetch_hangs.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fetch_fails.load(Ordering::SeqCst) {
            return Err(PlayerError::Network("connection refused".to_string()));
        }
        let profile = self
            .lookup(id)
            .ok_or_else(|| PlayerError::NotFound(id.to_string()))?;
        let videos: Vec<Video> = profile.video_ids.iter().map(|v| video(v)).collect();
        Ok(EnrichedProfile::resolve(profile, &videos))
    }

    async fn heartbeat(&self, _id: &str) -> Result<()> {
        self.heartbeats.fetch_add(1, Ordering::SeqCst);
        if self.heartbeat_fails.load(Ordering::SeqCst) {
            return Err(PlayerError::Network("connection reset".to_string()));
        }
        Ok(())
    }
}

/// Records every surface call; refusals are switchable
#[derive(Default)]
pub struct FakeSurface {
    plays: Mutex<Vec<(String, bool)>>,
    mute_calls: Mutex<Vec<bool>>,
    block_sound: AtomicBool,
    block_muted: AtomicBool,
    deny_fullscreen: AtomicBool,
    fail_resume: AtomicBool,
    fullscreen: AtomicBool,
    resumes: AtomicUsize,
    stopped: AtomicBool,
}

impl FakeSurface {
    pub fn set_block_sound(&self, block: bool) {
        self.block_sound.store(block, Ordering::SeqCst);
    }

    pub fn set_block_muted(&self, block: bool) {
        self.block_muted.store(block, Ordering::SeqCst);
    }

    pub fn set_deny_fullscreen(&self, deny: bool) {
        self.deny_fullscreen.store(deny, Ordering::SeqCst);
    }

    /// `resume` reports that nothing is playing
    pub fn set_fail_resume(&self, fail: bool) {
        self.fail_resume.store(fail, Ordering::SeqCst);
    }

    /// Every play attempt, refused ones included: (video id, muted)
    pub fn plays(&self) -> Vec<(String, bool)> {
        self.plays.lock().unwrap().clone()
    }

    pub fn last_play(&self) -> Option<(String, bool)> {
        self.plays.lock().unwrap().last().cloned()
    }

    pub fn mute_calls(&self) -> Vec<bool> {
        self.mute_calls.lock().unwrap().clone()
    }

    pub fn resume_count(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoSurface for FakeSurface {
    async fn play(&self, video: &Video, muted: bool) -> std::result::Result<(), PlayError> {
        self.plays.lock().unwrap().push((video.id.clone(), muted));
        if muted && self.block_muted.load(Ordering::SeqCst) {
            return Err(PlayError::Failed("decoder unavailable".to_string()));
        }
        if !muted && self.block_sound.load(Ordering::SeqCst) {
            return Err(PlayError::AutoplayBlocked);
        }
        self.stopped.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn set_muted(&self, muted: bool) {
        self.mute_calls.lock().unwrap().push(muted);
    }

    async fn resume(&self) -> std::result::Result<(), PlayError> {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        if self.fail_resume.load(Ordering::SeqCst) {
            return Err(PlayError::Failed("nothing is playing".to_string()));
        }
        Ok(())
    }

    fn is_fullscreen(&self) -> bool {
        self.fullscreen.load(Ordering::SeqCst)
    }

    async fn set_fullscreen(&self, fullscreen: bool) -> std::result::Result<(), PlayError> {
        if self.deny_fullscreen.load(Ordering::SeqCst) {
            return Err(PlayError::Failed("fullscreen denied".to_string()));
        }
        self.fullscreen.store(fullscreen, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}
