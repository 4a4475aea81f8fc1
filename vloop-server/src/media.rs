//! Uploaded media files
//!
//! Files live flat in `<root>/uploads` under a collision-resistant stored
//! name `<unix_millis>-<random><.ext>`. The original name is only kept as
//! metadata; it never becomes part of a filesystem path.

use axum::extract::multipart::Field;
use rand::Rng;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};

/// A file written by [`MediaStore::save_field`]
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub filename: String,
    pub size: u64,
}

pub struct MediaStore {
    uploads_dir: PathBuf,
}

impl MediaStore {
    pub fn new(uploads_dir: PathBuf) -> Self {
        Self { uploads_dir }
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    /// Stored name for an upload, keeping the original extension (lowercased)
    /// if it is a plain alphanumeric one
    pub fn stored_filename(original_name: &str) -> String {
        let millis = vloop_common::time::unix_millis(vloop_common::time::now());
        let suffix: u32 = rand::thread_rng().gen();

        let extension = Path::new(original_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| ext.to_ascii_lowercase());

        match extension {
            Some(ext) => format!("{}-{}.{}", millis, suffix, ext),
            None => format!("{}-{}", millis, suffix),
        }
    }

    pub fn path_of(&self, filename: &str) -> PathBuf {
        self.uploads_dir.join(filename)
    }

    /// Stream a multipart field to disk without buffering it in memory.
    ///
    /// A partially written file is removed if the stream fails.
    pub async fn save_field(
        &self,
        original_name: &str,
        mut field: Field<'_>,
    ) -> ApiResult<StoredFile> {
        let filename = Self::stored_filename(original_name);
        let path = self.path_of(&filename);

        fs::create_dir_all(&self.uploads_dir).await?;
        let mut file = fs::File::create(&path).await?;

        let mut size: u64 = 0;
        let written = async {
            while let Some(chunk) = field.chunk().await? {
                file.write_all(&chunk).await?;
                size += chunk.len() as u64;
            }
            file.flush().await?;
            Ok::<(), ApiError>(())
        }
        .await;

        if let Err(err) = written {
            drop(file);
            if let Err(cleanup) = fs::remove_file(&path).await {
                warn!("Failed to remove partial upload {}: {}", path.display(), cleanup);
            }
            return Err(err);
        }

        debug!("Stored upload {} as {} ({} bytes)", original_name, filename, size);
        Ok(StoredFile { filename, size })
    }

    /// Remove a stored file. A file that is already gone counts as removed.
    pub async fn remove(&self, filename: &str) -> std::io::Result<()> {
        match fs::remove_file(self.path_of(filename)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}

/// Reject uploads without a usable field
pub fn missing_file() -> ApiError {
    ApiError::BadRequest("No file uploaded".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_stored_filename_keeps_extension() {
        let name = MediaStore::stored_filename("Summer Promo.MP4");
        assert!(name.ends_with(".mp4"));
        let stem = name.trim_end_matches(".mp4");
        let (millis, random) = stem.split_once('-').unwrap();
        assert!(millis.parse::<u64>().is_ok());
        assert!(random.parse::<u32>().is_ok());
    }

    #[test]
    fn test_stored_filename_without_extension() {
        let name = MediaStore::stored_filename("clip");
        assert!(!name.contains('.'));
    }

    #[test]
    fn test_stored_filename_ignores_path_components() {
        let name = MediaStore::stored_filename("../../etc/passwd");
        assert!(!name.contains('/'));
        assert!(!name.contains(".."));
    }

    #[test]
    fn test_stored_filenames_differ() {
        let a = MediaStore::stored_filename("a.mp4");
        let b = MediaStore::stored_filename("a.mp4");
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_remove_missing_file_is_ok() {
        let dir = TempDir::new().unwrap();
        let media = MediaStore::new(dir.path().to_path_buf());
        media.remove("nothing-here.mp4").await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_deletes_file() {
        let dir = TempDir::new().unwrap();
        let media = MediaStore::new(dir.path().to_path_buf());
        std::fs::write(media.path_of("x.mp4"), b"data").unwrap();

        media.remove("x.mp4").await.unwrap();
        assert!(!media.path_of("x.mp4").exists());
    }
}
