//! Profile Service
//!
//! Every mutation of videos and profiles goes through here so that, after
//! each operation, profiles only reference existing videos, playlist order is
//! exactly what the editor submitted, and ids are never reused.
//!
//! Mutations run load → modify → replace under a single writer lock, so two
//! concurrent edits can never overwrite each other's work. Reads take no lock
//! and may see the dataset as of the previous completed write.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use vloop_common::{ids, time, Dataset, EnrichedProfile, Error, Profile, Result, Video};

use crate::store::EntityStore;

pub struct ProfileService {
    store: Arc<dyn EntityStore>,
    write_lock: Mutex<()>,
    /// profile id -> last heartbeat; liveness is ephemeral and never persisted
    heartbeats: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
            heartbeats: RwLock::new(HashMap::new()),
        }
    }

    /// Run `apply` against the current dataset and persist the result in one
    /// `replace`. Nothing is written if `apply` fails.
    async fn mutate<T, F>(&self, apply: F) -> Result<T>
    where
        F: FnOnce(&mut Dataset) -> Result<T>,
    {
        let _guard = self.write_lock.lock().await;
        let mut dataset = self.store.load().await?;
        let out = apply(&mut dataset)?;
        self.store.replace(&dataset).await?;
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Videos
    // ------------------------------------------------------------------

    /// All videos in upload order
    pub async fn list_videos(&self) -> Result<Vec<Video>> {
        Ok(self.store.load().await?.videos)
    }

    /// Register an uploaded file. The upload layer has already stored it.
    pub async fn add_video(
        &self,
        original_name: &str,
        size: u64,
        stored_filename: &str,
    ) -> Result<Video> {
        let video = Video {
            id: ids::generate(),
            filename: stored_filename.to_string(),
            original_name: original_name.to_string(),
            size,
            uploaded_at: time::now(),
        };

        let record = video.clone();
        self.mutate(move |data| {
            data.videos.push(record);
            Ok(())
        })
        .await?;

        info!("Added video {} ({}, {} bytes)", video.id, video.original_name, video.size);
        Ok(video)
    }

    /// Delete a video and strip it from every playlist in the same write.
    ///
    /// Returns the removed record; the caller deletes the stored file
    /// afterwards, so a crash in between leaves at most an orphaned file.
    pub async fn delete_video(&self, id: &str) -> Result<Video> {
        let removed = self
            .mutate(|data| {
                data.remove_video_cascading(id)
                    .ok_or_else(|| Error::NotFound(format!("video {}", id)))
            })
            .await?;

        info!("Deleted video {} ({})", removed.id, removed.original_name);
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Profiles
    // ------------------------------------------------------------------

    /// All profiles (not enriched), with heartbeat times attached
    pub async fn list_profiles(&self) -> Result<Vec<Profile>> {
        let mut profiles = self.store.load().await?.profiles;
        let heartbeats = self.heartbeats.read().await;
        for profile in &mut profiles {
            profile.last_seen = heartbeats.get(&profile.id).copied();
        }
        Ok(profiles)
    }

    /// A profile with its playlist resolved to video records.
    ///
    /// Ids that no longer resolve are skipped; the rest keep their order.
    pub async fn get_profile(&self, id: &str) -> Result<EnrichedProfile> {
        let data = self.store.load().await?;
        let profile = data
            .find_profile(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("profile {}", id)))?;

        let mut enriched = EnrichedProfile::resolve(profile, &data.videos);
        if enriched.videos.len() < enriched.profile.video_ids.len() {
            debug!(
                "Profile {} has {} unresolved video ids",
                id,
                enriched.profile.video_ids.len() - enriched.videos.len()
            );
        }
        enriched.profile.last_seen = self.heartbeats.read().await.get(id).copied();
        Ok(enriched)
    }

    /// Look a profile up by its public name (first match in store order)
    pub async fn find_profile_by_name(&self, name: &str) -> Result<Profile> {
        let data = self.store.load().await?;
        let mut profile = data
            .find_profile_by_name(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("profile named '{}'", name)))?;
        profile.last_seen = self.heartbeats.read().await.get(&profile.id).copied();
        Ok(profile)
    }

    /// Create or update a profile.
    ///
    /// - `id` present: update that profile; `name` only if non-empty,
    ///   `video_ids` only if present. Unknown id is `NotFound`.
    /// - `id` absent: create a profile with a fresh id.
    ///
    /// Names are unique across profiles and every submitted video id must
    /// exist. `video_ids` order is stored exactly as given.
    pub async fn upsert_profile(
        &self,
        id: Option<&str>,
        name: &str,
        video_ids: Option<Vec<String>>,
    ) -> Result<Profile> {
        let name = name.trim().to_string();

        let saved = self
            .mutate(move |data| {
                if let Some(id) = id {
                    if data.find_profile(id).is_none() {
                        return Err(Error::NotFound(format!("profile {}", id)));
                    }
                }

                if let Some(ids) = &video_ids {
                    let unknown = data.unknown_video_ids(ids);
                    if !unknown.is_empty() {
                        return Err(Error::InvalidInput(format!(
                            "unknown video ids: {}",
                            unknown.join(", ")
                        )));
                    }
                }

                if !name.is_empty() {
                    let taken = data
                        .profiles
                        .iter()
                        .any(|p| p.name == name && Some(p.id.as_str()) != id);
                    if taken {
                        return Err(Error::Conflict(format!(
                            "profile name '{}' is already in use",
                            name
                        )));
                    }
                }

                match id {
                    Some(id) => {
                        let profile = data
                            .find_profile_mut(id)
                            .ok_or_else(|| Error::NotFound(format!("profile {}", id)))?;
                        if !name.is_empty() {
                            profile.name = name;
                        }
                        if let Some(ids) = video_ids {
                            profile.video_ids = ids;
                        }
                        Ok(profile.clone())
                    }
                    None => {
                        if name.is_empty() {
                            return Err(Error::InvalidInput(
                                "profile name must not be empty".to_string(),
                            ));
                        }
                        let profile = Profile {
                            id: ids::generate(),
                            name,
                            video_ids: video_ids.unwrap_or_default(),
                            last_seen: None,
                        };
                        data.profiles.push(profile.clone());
                        Ok(profile)
                    }
                }
            })
            .await?;

        info!(
            "Saved profile {} '{}' ({} videos)",
            saved.id,
            saved.name,
            saved.video_ids.len()
        );
        Ok(saved)
    }

    /// Delete a profile. Deleting an absent profile succeeds.
    pub async fn delete_profile(&self, id: &str) -> Result<()> {
        {
            let _guard = self.write_lock.lock().await;
            let mut data = self.store.load().await?;
            let before = data.profiles.len();
            data.profiles.retain(|p| p.id != id);
            if data.profiles.len() != before {
                self.store.replace(&data).await?;
                info!("Deleted profile {}", id);
            } else {
                debug!("Profile {} already absent", id);
            }
        }

        self.heartbeats.write().await.remove(id);
        Ok(())
    }

    /// Number of profiles whose device sent a heartbeat recently
    pub async fn online_device_count(&self) -> usize {
        let now = time::now();
        self.heartbeats
            .read()
            .await
            .values()
            .filter(|seen| time::seen_within(Some(**seen), now, time::ONLINE_WINDOW))
            .count()
    }

    /// Record that a playback device is alive on this profile
    pub async fn record_heartbeat(&self, id: &str) -> Result<DateTime<Utc>> {
        let data = self.store.load().await?;
        if data.find_profile(id).is_none() {
            return Err(Error::NotFound(format!("profile {}", id)));
        }

        let now = time::now();
        self.heartbeats.write().await.insert(id.to_string(), now);
        debug!("Heartbeat from profile {}", id);
        Ok(now)
    }
}
