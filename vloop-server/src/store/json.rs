//! Single-file JSON backend
//!
//! Reads and writes the original `db.json` layout
//! (`{"videos": [...], "profiles": [...]}`). A replace writes a sibling temp
//! file, syncs it and renames it over the target, so readers see either the
//! old document or the new one.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};
use vloop_common::{Dataset, Result};

use super::EntityStore;

pub struct JsonFileStore {
    path: PathBuf,
    /// Serializes writers on the temp file
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "db.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn write_atomically(&self, dataset: &Dataset) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let bytes = serde_json::to_vec_pretty(dataset)?;
        let temp = self.temp_path();

        let mut file = fs::File::create(&temp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp, &self.path).await?;
        debug!(
            "Wrote {} ({} videos, {} profiles)",
            self.path.display(),
            dataset.videos.len(),
            dataset.profiles.len()
        );
        Ok(())
    }
}

#[async_trait]
impl EntityStore for JsonFileStore {
    async fn init(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        if fs::try_exists(&self.path).await? {
            return Ok(());
        }
        info!("Creating empty dataset at {}", self.path.display());
        self.write_atomically(&Dataset::default()).await
    }

    async fn load(&self) -> Result<Dataset> {
        let bytes = fs::read(&self.path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn replace(&self, dataset: &Dataset) -> Result<()> {
        self.write_atomically(dataset).await
    }

    fn backend(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_creates_empty_file() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("db.json"));

        store.init().await.unwrap();
        let raw = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["videos"], serde_json::json!([]));
        assert_eq!(value["profiles"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_init_keeps_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.json");
        std::fs::write(
            &path,
            r#"{"videos":[],"profiles":[{"id":"1","name":"Lobby","videoIds":[]}]}"#,
        )
        .unwrap();

        let store = JsonFileStore::new(path);
        store.init().await.unwrap();
        let data = store.load().await.unwrap();
        assert_eq!(data.profiles[0].name, "Lobby");
    }

    #[tokio::test]
    async fn test_replace_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("db.json"));
        store.init().await.unwrap();
        store.replace(&Dataset::default()).await.unwrap();

        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_load_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"));
        let err = store.load().await.unwrap_err();
        assert!(err.is_storage_failure());
    }
}
