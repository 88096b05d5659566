//! Endpoints for the authenticated user's own account.

use crate::auth::require_auth;
use crate::error::ApiResult;
use crate::handlers::common::{UploadQuery, UserResponse, content_type, read_json, read_upload};
use crate::services::{ProfileInput, Upload};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// GET /api/users/me
pub async fn get_me(State(state): State<AppState>, req: Request) -> ApiResult<Json<UserResponse>> {
    let principal = require_auth(&req)?.principal;
    let profile = state.users.get_profile(principal).await?;
    Ok(Json(profile.into()))
}

/// PUT /api/users/me
pub async fn update_me(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<UserResponse>> {
    let principal = require_auth(&req)?.principal;
    let body: UpdateProfileRequest =
        read_json(req.into_body(), state.config.server.max_json_body_size).await?;
    let profile = state
        .users
        .update_profile(
            principal,
            ProfileInput {
                username: body.username,
                email: body.email,
            },
        )
        .await?;
    Ok(Json(profile.into()))
}

/// DELETE /api/users/me - Delete the account and everything it owns.
pub async fn delete_me(State(state): State<AppState>, req: Request) -> ApiResult<StatusCode> {
    let principal = require_auth(&req)?.principal;
    state.users.delete_account(principal).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/users/me/password
pub async fn change_password(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<StatusCode> {
    let principal = require_auth(&req)?.principal;
    let body: ChangePasswordRequest =
        read_json(req.into_body(), state.config.server.max_json_body_size).await?;
    state
        .auth
        .change_password(principal, &body.current_password, &body.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/users/me/profile-image?filename=... - Raw image body.
pub async fn upload_profile_image(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    req: Request,
) -> ApiResult<Json<UserResponse>> {
    let principal = require_auth(&req)?.principal;
    let mime_type = content_type(&req);
    let data = read_upload(req.into_body(), state.config.upload.max_upload_size).await?;
    let profile = state
        .users
        .update_profile_image(
            principal,
            Upload {
                file_name: query.filename,
                mime_type,
                data,
            },
        )
        .await?;
    Ok(Json(profile.into()))
}
