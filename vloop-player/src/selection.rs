//! Profile selection on the device
//!
//! Used when the device starts without a profile name, and again when the
//! profile it was playing is deleted on the server.

use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, Lines};
use vloop_common::Profile;

use crate::error::Result;
use crate::source::ProfileSource;

/// Outcome of one selection round
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Chosen(String),
    /// The server has no profiles yet
    NoProfiles,
    /// Input closed before a valid answer
    NoInput,
}

/// Numbered list of profiles as shown to the viewer
pub fn render_choices(profiles: &[Profile]) -> String {
    let mut out = String::from("Profiles on this server:\n");
    for (n, profile) in profiles.iter().enumerate() {
        out.push_str(&format!(
            "  {}) {} ({} videos)\n",
            n + 1,
            profile.name,
            profile.video_ids.len()
        ));
    }
    out
}

/// Resolve an answer: a 1-based number from the list, or a name (exact
/// match first, then case-insensitive)
pub fn pick_profile(profiles: &[Profile], answer: &str) -> Option<String> {
    let answer = answer.trim();
    if answer.is_empty() {
        return None;
    }
    if let Ok(n) = answer.parse::<usize>() {
        if let Some(profile) = n.checked_sub(1).and_then(|i| profiles.get(i)) {
            return Some(profile.name.clone());
        }
    }
    profiles
        .iter()
        .find(|p| p.name == answer)
        .or_else(|| profiles.iter().find(|p| p.name.eq_ignore_ascii_case(answer)))
        .map(|p| p.name.clone())
}

/// List the server's profiles on `out` and read answers from `input` until
/// one names a profile
pub async fn choose_profile<R, W>(
    source: &dyn ProfileSource,
    input: &mut Lines<R>,
    out: &mut W,
) -> Result<Selection>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let profiles = source.list_profiles().await?;
    if profiles.is_empty() {
        out.write_all(b"No profiles on this server yet.\n").await?;
        out.flush().await?;
        return Ok(Selection::NoProfiles);
    }

    out.write_all(render_choices(&profiles).as_bytes()).await?;
    loop {
        out.write_all(b"Choose a profile by number or name: ").await?;
        out.flush().await?;

        let Some(line) = input.next_line().await? else {
            return Ok(Selection::NoInput);
        };
        match pick_profile(&profiles, &line) {
            Some(name) => return Ok(Selection::Chosen(name)),
            None => {
                out.write_all(format!("No profile matches '{}'.\n", line.trim()).as_bytes())
                    .await?
            }
        }
    }
}
