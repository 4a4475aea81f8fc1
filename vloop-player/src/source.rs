//! Where a playback device gets its profile from
//!
//! [`ProfileSource`] is the seam the controller talks through;
//! [`HttpProfileSource`] is the implementation used against a running
//! vloop-server.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use vloop_common::{EnrichedProfile, Profile};

use crate::error::{PlayerError, Result};

#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Every profile, for choosing one on the device
    async fn list_profiles(&self) -> Result<Vec<Profile>>;

    /// Resolve a public profile name to its record
    async fn profile_by_name(&self, name: &str) -> Result<Profile>;

    /// Fetch a profile with its playlist resolved to videos
    async fn profile(&self, id: &str) -> Result<EnrichedProfile>;

    /// Report that this device is alive on the profile
    async fn heartbeat(&self, id: &str) -> Result<()>;
}

/// Append percent-encoded path segments to `base`
pub fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| PlayerError::InvalidServerUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub struct HttpProfileSource {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpProfileSource {
    /// `request_timeout` bounds every call, so a dead server never blocks a
    /// session step indefinitely.
    pub fn new(server_url: &str, request_timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(server_url)
            .map_err(|e| PlayerError::InvalidServerUrl(format!("{}: {}", server_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(PlayerError::InvalidServerUrl(server_url.to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("vloop-player/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(PlayerError::NotFound(what.to_string())),
            status if !status.is_success() => {
                Err(PlayerError::Network(format!("HTTP {} fetching {}", status, what)))
            }
            _ => Ok(response.json::<T>().await?),
        }
    }
}

#[async_trait]
impl ProfileSource for HttpProfileSource {
    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        let url = endpoint(&self.base_url, &["api", "profiles"])?;
        self.get_json(url, "profiles").await
    }

    async fn profile_by_name(&self, name: &str) -> Result<Profile> {
        let url = endpoint(&self.base_url, &["api", "profiles", "by-name", name])?;
        self.get_json(url, name).await
    }

    async fn profile(&self, id: &str) -> Result<EnrichedProfile> {
        let url = endpoint(&self.base_url, &["api", "profiles", id])?;
        self.get_json(url, id).await
    }

    async fn heartbeat(&self, id: &str) -> Result<()> {
        let url = endpoint(&self.base_url, &["api", "profiles", id, "heartbeat"])?;
        let response = self.client.post(url).json(&serde_json::json!({})).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(PlayerError::NotFound(id.to_string())),
            status if !status.is_success() => {
                Err(PlayerError::Network(format!("HTTP {} on heartbeat", status)))
            }
            _ => Ok(()),
        }
    }
}
