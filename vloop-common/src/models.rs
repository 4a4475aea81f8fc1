//! # Domain Models
//!
//! Videos, profiles (ordered playlists of video ids) and the dataset that
//! holds both collections. Field names are camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An uploaded video file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    /// Storage key under the uploads folder (not shown to operators)
    pub filename: String,
    pub original_name: String,
    /// Size in bytes
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// A named, ordered playlist of videos
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    /// Public playback key
    pub name: String,
    /// Playback order; duplicates allowed
    #[serde(default)]
    pub video_ids: Vec<String>,
    /// Last heartbeat from a playback device. Never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

/// A profile with its video ids resolved into full records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedProfile {
    #[serde(flatten)]
    pub profile: Profile,
    #[serde(default)]
    pub videos: Vec<Video>,
}

impl EnrichedProfile {
    /// Resolve `profile.video_ids` against `videos`.
    ///
    /// Ids that no longer resolve are dropped; survivors keep their order.
    pub fn resolve(profile: Profile, videos: &[Video]) -> Self {
        let resolved = profile
            .video_ids
            .iter()
            .filter_map(|id| videos.iter().find(|v| &v.id == id))
            .cloned()
            .collect();
        Self {
            profile,
            videos: resolved,
        }
    }

    pub fn id(&self) -> &str {
        &self.profile.id
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }
}

/// The whole persisted state: both collections, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub videos: Vec<Video>,
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

impl Dataset {
    pub fn find_video(&self, id: &str) -> Option<&Video> {
        self.videos.iter().find(|v| v.id == id)
    }

    pub fn find_profile(&self, id: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    pub fn find_profile_mut(&mut self, id: &str) -> Option<&mut Profile> {
        self.profiles.iter_mut().find(|p| p.id == id)
    }

    /// First profile with this exact name, in store order
    pub fn find_profile_by_name(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Remove a video and every reference to it.
    ///
    /// Returns the removed record, or `None` if no video has `id`.
    pub fn remove_video_cascading(&mut self, id: &str) -> Option<Video> {
        let index = self.videos.iter().position(|v| v.id == id)?;
        let removed = self.videos.remove(index);
        for profile in &mut self.profiles {
            profile.video_ids.retain(|vid| vid != id);
        }
        Some(removed)
    }

    /// Ids in `ids` that do not name a video
    pub fn unknown_video_ids<'a>(&self, ids: &'a [String]) -> Vec<&'a str> {
        ids.iter()
            .filter(|id| self.find_video(id).is_none())
            .map(String::as_str)
            .collect()
    }
}
