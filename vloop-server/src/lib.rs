//! vloop-server library - video library and profile management
//!
//! Serves the operator API under `/api`, the uploaded files under
//! `/uploads` and `/health` for monitoring.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod media;
pub mod service;
pub mod store;

pub use error::{ApiError, ApiResult};
pub use media::MediaStore;
pub use service::ProfileService;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ProfileService>,
    pub media: Arc<MediaStore>,
    /// Used for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(service: ProfileService, media: MediaStore) -> Self {
        Self {
            service: Arc::new(service),
            media: Arc::new(media),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
///
/// `max_upload_bytes` caps request bodies, including multipart uploads.
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    let uploads = ServeDir::new(state.media.uploads_dir());

    Router::new()
        .nest("/api", api::api_routes())
        .merge(api::health_routes())
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
