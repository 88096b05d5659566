//! Manual endpoints.

use crate::auth::require_auth;
use crate::error::ApiResult;
use crate::handlers::common::{ManualDetailResponse, ManualResponse, PageQuery, read_json};
use crate::services::ManualInput;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use guideforge_core::{Page, PageRequest};
use serde::{Deserialize, Serialize};

/// Body for creating or replacing a manual.
#[derive(Debug, Deserialize)]
pub struct ManualRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub is_public: bool,
}

impl From<ManualRequest> for ManualInput {
    fn from(body: ManualRequest) -> Self {
        Self {
            title: body.title,
            description: body.description,
            category: body.category,
            is_public: body.is_public,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteManualResponse {
    pub id: i64,
    pub steps_deleted: u64,
    pub images_deleted: u64,
}

/// GET /api/manuals - The caller's manuals, newest first.
pub async fn list_my_manuals(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
    req: Request,
) -> ApiResult<Json<Page<ManualResponse>>> {
    let principal = require_auth(&req)?.principal;
    let page = PageRequest::normalize(query.page, query.limit);
    let manuals = state.manuals.list_my_manuals(principal, page).await?;
    Ok(Json(manuals.map(ManualResponse::from)))
}

/// GET /api/manuals/public - Every public manual, newest first.
pub async fn list_public_manuals(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
    req: Request,
) -> ApiResult<Json<Page<ManualResponse>>> {
    require_auth(&req)?;
    let page = PageRequest::normalize(query.page, query.limit);
    let manuals = state.manuals.list_public_manuals(page).await?;
    Ok(Json(manuals.map(ManualResponse::from)))
}

/// POST /api/manuals
pub async fn create_manual(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<(StatusCode, Json<ManualResponse>)> {
    let principal = require_auth(&req)?.principal;
    let body: ManualRequest =
        read_json(req.into_body(), state.config.server.max_json_body_size).await?;
    let manual = state.manuals.create_manual(principal, body.into()).await?;
    Ok((StatusCode::CREATED, Json(manual.into())))
}

/// GET /api/manuals/{id} - Manual with steps and images.
pub async fn get_manual(
    State(state): State<AppState>,
    Path(manual_id): Path<i64>,
    req: Request,
) -> ApiResult<Json<ManualDetailResponse>> {
    let principal = require_auth(&req)?.principal;
    let detail = state.manuals.get_manual(manual_id, principal).await?;
    Ok(Json(detail.into()))
}

/// PUT /api/manuals/{id}
pub async fn update_manual(
    State(state): State<AppState>,
    Path(manual_id): Path<i64>,
    req: Request,
) -> ApiResult<Json<ManualResponse>> {
    let principal = require_auth(&req)?.principal;
    let body: ManualRequest =
        read_json(req.into_body(), state.config.server.max_json_body_size).await?;
    let manual = state
        .manuals
        .update_manual(manual_id, principal, body.into())
        .await?;
    Ok(Json(manual.into()))
}

/// DELETE /api/manuals/{id}
pub async fn delete_manual(
    State(state): State<AppState>,
    Path(manual_id): Path<i64>,
    req: Request,
) -> ApiResult<Json<DeleteManualResponse>> {
    let principal = require_auth(&req)?.principal;
    let stats = state.manuals.delete_manual(manual_id, principal).await?;
    Ok(Json(DeleteManualResponse {
        id: manual_id,
        steps_deleted: stats.steps,
        images_deleted: stats.images,
    }))
}
