//! HTTP API handlers

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::AppState;

pub mod health;
pub mod profiles;
pub mod system;
pub mod videos;

pub use health::health_routes;

/// Routes mounted under `/api`
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/videos", get(videos::list_videos).post(videos::upload_video))
        .route("/videos/:id", delete(videos::delete_video))
        .route(
            "/profiles",
            get(profiles::list_profiles).post(profiles::upsert_profile),
        )
        .route("/profiles/by-name/:name", get(profiles::get_profile_by_name))
        .route(
            "/profiles/:id",
            get(profiles::get_profile).delete(profiles::delete_profile),
        )
        .route("/profiles/:id/heartbeat", post(profiles::heartbeat))
        .route("/system/status", get(system::status))
}
