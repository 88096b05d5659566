//! Image upload, download and deletion.

use crate::auth::require_auth;
use crate::error::ApiResult;
use crate::handlers::common::{ImageResponse, UploadQuery, content_type, read_upload};
use crate::services::Upload;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::response::IntoResponse;

/// POST /api/steps/{id}/images?filename=... - Raw image body; the
/// Content-Type header is recorded as the MIME type.
pub async fn upload_image(
    State(state): State<AppState>,
    Path(step_id): Path<i64>,
    Query(query): Query<UploadQuery>,
    req: Request,
) -> ApiResult<(StatusCode, Json<ImageResponse>)> {
    let principal = require_auth(&req)?.principal;
    let mime_type = content_type(&req);
    let data = read_upload(req.into_body(), state.config.upload.max_upload_size).await?;
    let image = state
        .manuals
        .upload_image(
            step_id,
            principal,
            Upload {
                file_name: query.filename,
                mime_type,
                data,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(image.into())))
}

/// GET /api/images/{id} - Image bytes.
pub async fn get_image(
    State(state): State<AppState>,
    Path(image_id): Path<i64>,
    req: Request,
) -> ApiResult<impl IntoResponse> {
    let principal = require_auth(&req)?.principal;
    let (image, data) = state.manuals.get_image_content(image_id, principal).await?;
    Ok((
        [
            (CONTENT_TYPE, image.mime_type),
            (CONTENT_LENGTH, data.len().to_string()),
        ],
        data,
    ))
}

/// DELETE /api/images/{id}
pub async fn delete_image(
    State(state): State<AppState>,
    Path(image_id): Path<i64>,
    req: Request,
) -> ApiResult<StatusCode> {
    let principal = require_auth(&req)?.principal;
    state.manuals.delete_image(image_id, principal).await?;
    Ok(StatusCode::NO_CONTENT)
}
