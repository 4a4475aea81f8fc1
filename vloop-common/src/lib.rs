//! # vloop Common Library
//!
//! Shared code for the vloop server and playback devices:
//! - Data model (videos, profiles, datasets)
//! - API request/response types
//! - Common error type
//! - Configuration loading and root folder resolution
//! - Id and timestamp helpers

pub mod api;
pub mod config;
pub mod error;
pub mod ids;
pub mod models;
pub mod time;

pub use error::{Error, Result};
pub use models::{Dataset, EnrichedProfile, Profile, Video};
