//! Video library endpoints

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use tracing::{info, warn};
use vloop_common::api::SuccessResponse;
use vloop_common::Video;

use crate::error::ApiResult;
use crate::media::{missing_file, StoredFile};
use crate::AppState;

/// Multipart field carrying the file
const UPLOAD_FIELD: &str = "video";

/// GET /api/videos
pub async fn list_videos(State(state): State<AppState>) -> ApiResult<Json<Vec<Video>>> {
    Ok(Json(state.service.list_videos().await?))
}

/// POST /api/videos
///
/// Streams the `video` field to the uploads folder, then records it. Other
/// fields are ignored. If the rest of the request is malformed or recording
/// fails, the stored file is removed again.
pub async fn upload_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Video>> {
    let mut upload: Option<(String, StoredFile)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                if let Some((_, stored)) = &upload {
                    discard(&state, stored).await;
                }
                return Err(err.into());
            }
        };
        if field.name() != Some(UPLOAD_FIELD) || upload.is_some() {
            continue;
        }
        let original_name = field
            .file_name()
            .filter(|name| !name.is_empty())
            .unwrap_or("upload")
            .to_string();
        let stored = state.media.save_field(&original_name, field).await?;
        upload = Some((original_name, stored));
    }

    let (original_name, stored) = upload.ok_or_else(missing_file)?;

    match state
        .service
        .add_video(&original_name, stored.size, &stored.filename)
        .await
    {
        Ok(video) => Ok(Json(video)),
        Err(err) => {
            discard(&state, &stored).await;
            Err(err.into())
        }
    }
}

/// Remove a stored upload that never got a metadata record
async fn discard(state: &AppState, stored: &StoredFile) {
    if let Err(cleanup) = state.media.remove(&stored.filename).await {
        warn!("Failed to remove unrecorded upload {}: {}", stored.filename, cleanup);
    }
}

/// DELETE /api/videos/:id
///
/// Metadata goes first; a file that cannot be removed afterwards is only
/// logged.
pub async fn delete_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    let video = state.service.delete_video(&id).await?;

    match state.media.remove(&video.filename).await {
        Ok(()) => info!("Removed file {}", video.filename),
        Err(err) => warn!("Video {} deleted but file {} remains: {}", id, video.filename, err),
    }

    Ok(Json(SuccessResponse::ok()))
}
