//! Entity Store
//!
//! Owns the persisted copy of the whole [`Dataset`]. The contract is a
//! whole-dataset read and a whole-dataset overwrite: callers read, modify in
//! memory and write everything back. A `load` never observes a partially
//! written dataset; it sees the last completed `replace` or the initial empty
//! dataset.

mod json;
mod sqlite;

pub use json::JsonFileStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use vloop_common::config::{RootFolderInitializer, StoreBackend};
use vloop_common::{Dataset, Result};

/// Persistence contract for videos and profiles
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Persist an empty dataset if nothing is persisted yet
    async fn init(&self) -> Result<()>;

    /// Read the complete dataset
    async fn load(&self) -> Result<Dataset>;

    /// Overwrite the complete dataset
    async fn replace(&self, dataset: &Dataset) -> Result<()>;

    /// Backend name for logs
    fn backend(&self) -> &'static str;
}

/// Open and initialize the configured backend inside the root folder
pub async fn open_store(
    backend: StoreBackend,
    layout: &RootFolderInitializer,
) -> Result<Arc<dyn EntityStore>> {
    let store: Arc<dyn EntityStore> = match backend {
        StoreBackend::Sqlite => Arc::new(SqliteStore::connect(&layout.database_path()).await?),
        StoreBackend::Json => Arc::new(JsonFileStore::new(layout.json_dataset_path())),
    };
    store.init().await?;
    info!("Entity store ready ({})", store.backend());
    Ok(store)
}
