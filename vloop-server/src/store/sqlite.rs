//! SQLite backend
//!
//! Tables mirror the dataset: `videos`, `profiles`, and `profile_videos`
//! holding each playlist position. `seq` keeps insertion order. A replace
//! rewrites all three tables inside one transaction; a load reads all three
//! inside one transaction, so it sees a single committed snapshot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use vloop_common::{Dataset, Profile, Result, Video};

use super::EntityStore;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database file at `db_path`
    pub async fn connect(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        debug!("Connecting to database: {}", db_path.display());

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Private in-memory database (single connection so every query sees it)
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl EntityStore for SqliteStore {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS videos (
                seq INTEGER NOT NULL,
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                original_name TEXT NOT NULL,
                size INTEGER NOT NULL,
                uploaded_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                seq INTEGER NOT NULL,
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // No foreign key on video_id: dangling ids are tolerated on read
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profile_videos (
                profile_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                video_id TEXT NOT NULL,
                PRIMARY KEY (profile_id, position)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Database tables initialized (videos, profiles, profile_videos)");
        Ok(())
    }

    async fn load(&self) -> Result<Dataset> {
        let mut tx = self.pool.begin().await?;

        let video_rows = sqlx::query(
            "SELECT id, filename, original_name, size, uploaded_at FROM videos ORDER BY seq ASC",
        )
        .fetch_all(&mut *tx)
        .await?;

        let mut videos = Vec::with_capacity(video_rows.len());
        for row in video_rows {
            let size: i64 = row.try_get("size")?;
            let uploaded_at: DateTime<Utc> = row.try_get("uploaded_at")?;
            videos.push(Video {
                id: row.try_get("id")?,
                filename: row.try_get("filename")?,
                original_name: row.try_get("original_name")?,
                size: size.max(0) as u64,
                uploaded_at,
            });
        }

        let entry_rows = sqlx::query(
            "SELECT profile_id, video_id FROM profile_videos ORDER BY profile_id, position ASC",
        )
        .fetch_all(&mut *tx)
        .await?;

        let mut playlists: HashMap<String, Vec<String>> = HashMap::new();
        for row in entry_rows {
            let profile_id: String = row.try_get("profile_id")?;
            let video_id: String = row.try_get("video_id")?;
            playlists.entry(profile_id).or_default().push(video_id);
        }

        let profile_rows = sqlx::query("SELECT id, name FROM profiles ORDER BY seq ASC")
            .fetch_all(&mut *tx)
            .await?;

        let mut profiles = Vec::with_capacity(profile_rows.len());
        for row in profile_rows {
            let id: String = row.try_get("id")?;
            let video_ids = playlists.remove(&id).unwrap_or_default();
            profiles.push(Profile {
                name: row.try_get("name")?,
                id,
                video_ids,
                last_seen: None,
            });
        }

        tx.commit().await?;
        Ok(Dataset { videos, profiles })
    }

    async fn replace(&self, dataset: &Dataset) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM profile_videos").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM profiles").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM videos").execute(&mut *tx).await?;

        for (seq, video) in dataset.videos.iter().enumerate() {
            sqlx::query(
                "INSERT INTO videos (seq, id, filename, original_name, size, uploaded_at) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(seq as i64)
            .bind(&video.id)
            .bind(&video.filename)
            .bind(&video.original_name)
            .bind(video.size as i64)
            .bind(video.uploaded_at)
            .execute(&mut *tx)
            .await?;
        }

        for (seq, profile) in dataset.profiles.iter().enumerate() {
            sqlx::query("INSERT INTO profiles (seq, id, name) VALUES (?, ?, ?)")
                .bind(seq as i64)
                .bind(&profile.id)
                .bind(&profile.name)
                .execute(&mut *tx)
                .await?;

            for (position, video_id) in profile.video_ids.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO profile_videos (profile_id, position, video_id) VALUES (?, ?, ?)",
                )
                .bind(&profile.id)
                .bind(position as i64)
                .bind(video_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        debug!(
            "Replaced dataset ({} videos, {} profiles)",
            dataset.videos.len(),
            dataset.profiles.len()
        );
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fresh_database_loads_empty() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.init().await.unwrap();
        assert_eq!(store.load().await.unwrap(), Dataset::default());
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.init().await.unwrap();
        store.init().await.unwrap();
    }

    #[tokio::test]
    async fn test_load_before_init_fails() {
        let store = SqliteStore::in_memory().await.unwrap();
        let err = store.load().await.unwrap_err();
        assert!(err.is_storage_failure());
    }
}
