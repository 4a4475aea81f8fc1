//! Error types for vloop-player

use std::time::Duration;
use thiserror::Error;

/// Why a surface could not start or continue a video
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayError {
    /// The platform refused to start playback with sound.
    /// Expected on many devices; answered by retrying muted.
    #[error("autoplay with sound was blocked")]
    AutoplayBlocked,

    #[error("playback failed: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum PlayerError {
    /// The server does not know the profile
    #[error("Profile not found: {0}")]
    NotFound(String),

    /// Transport failure or unexpected server response
    #[error("Network error: {0}")]
    Network(String),

    /// A step exceeded its watchdog
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid server URL: {0}")]
    InvalidServerUrl(String),

    #[error("Playback error: {0}")]
    Playback(#[from] PlayError),

    /// Viewer terminal I/O
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for PlayerError {
    fn from(err: reqwest::Error) -> Self {
        PlayerError::Network(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
