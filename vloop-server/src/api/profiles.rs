//! Profile endpoints, used by the operator UI and by playback devices

use axum::{
    extract::{Path, State},
    Json,
};
use vloop_common::api::{HeartbeatResponse, SuccessResponse, UpsertProfileRequest};
use vloop_common::{EnrichedProfile, Profile};

use crate::error::ApiResult;
use crate::AppState;

/// GET /api/profiles
pub async fn list_profiles(State(state): State<AppState>) -> ApiResult<Json<Vec<Profile>>> {
    Ok(Json(state.service.list_profiles().await?))
}

/// GET /api/profiles/:id
pub async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<EnrichedProfile>> {
    Ok(Json(state.service.get_profile(&id).await?))
}

/// GET /api/profiles/by-name/:name
pub async fn get_profile_by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Profile>> {
    Ok(Json(state.service.find_profile_by_name(&name).await?))
}

/// POST /api/profiles
pub async fn upsert_profile(
    State(state): State<AppState>,
    Json(req): Json<UpsertProfileRequest>,
) -> ApiResult<Json<Profile>> {
    let profile = state
        .service
        .upsert_profile(req.id.as_deref(), &req.name, req.video_ids)
        .await?;
    Ok(Json(profile))
}

/// DELETE /api/profiles/:id
pub async fn delete_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    state.service.delete_profile(&id).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// POST /api/profiles/:id/heartbeat
pub async fn heartbeat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<HeartbeatResponse>> {
    let last_seen = state.service.record_heartbeat(&id).await?;
    Ok(Json(HeartbeatResponse {
        success: true,
        last_seen,
    }))
}
