//! vloop-player library - unattended looping playback of one profile
//!
//! A device resolves a profile by name, plays its videos in order and loops
//! forever, refreshing the playlist from the server at the end of each pass
//! and reporting a heartbeat while it runs.

pub mod controller;
pub mod error;
pub mod selection;
pub mod session;
pub mod source;
pub mod surface;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{LoadError, PlaybackController, PlaybackState, PlayerSnapshot};
pub use error::{PlayError, PlayerError};
pub use selection::{choose_profile, Selection};
pub use session::{PlayerSession, SessionCommand, SessionConfig, SessionHandle};
pub use source::{HttpProfileSource, ProfileSource};
pub use surface::{ProcessSurface, VideoSurface};
