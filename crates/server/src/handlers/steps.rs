//! Step endpoints, including bulk reordering.

use crate::auth::require_auth;
use crate::error::ApiResult;
use crate::handlers::common::{StepResponse, read_json};
use crate::services::StepInput;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use guideforge_core::StepOrder;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateStepRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Insert at this position instead of appending.
    #[serde(default)]
    pub order_number: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStepRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub steps: Vec<StepOrder>,
}

/// GET /api/manuals/{id}/steps
pub async fn list_steps(
    State(state): State<AppState>,
    Path(manual_id): Path<i64>,
    req: Request,
) -> ApiResult<Json<Vec<StepResponse>>> {
    let principal = require_auth(&req)?.principal;
    let steps = state.manuals.list_steps(manual_id, principal).await?;
    Ok(Json(steps.into_iter().map(StepResponse::from).collect()))
}

/// POST /api/manuals/{id}/steps
pub async fn create_step(
    State(state): State<AppState>,
    Path(manual_id): Path<i64>,
    req: Request,
) -> ApiResult<(StatusCode, Json<StepResponse>)> {
    let principal = require_auth(&req)?.principal;
    let body: CreateStepRequest =
        read_json(req.into_body(), state.config.server.max_json_body_size).await?;
    let step = state
        .manuals
        .create_step(
            manual_id,
            principal,
            StepInput {
                title: body.title,
                content: body.content,
            },
            body.order_number,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(step.into())))
}

/// PUT /api/manuals/{id}/steps/order - Atomic bulk reorder.
pub async fn update_step_order(
    State(state): State<AppState>,
    Path(manual_id): Path<i64>,
    req: Request,
) -> ApiResult<Json<Vec<StepResponse>>> {
    let principal = require_auth(&req)?.principal;
    let body: ReorderRequest =
        read_json(req.into_body(), state.config.server.max_json_body_size).await?;
    let steps = state
        .manuals
        .update_step_order(manual_id, principal, &body.steps)
        .await?;
    Ok(Json(steps.into_iter().map(StepResponse::from).collect()))
}

/// PUT /api/steps/{id}
pub async fn update_step(
    State(state): State<AppState>,
    Path(step_id): Path<i64>,
    req: Request,
) -> ApiResult<Json<StepResponse>> {
    let principal = require_auth(&req)?.principal;
    let body: UpdateStepRequest =
        read_json(req.into_body(), state.config.server.max_json_body_size).await?;
    let step = state
        .manuals
        .update_step(
            step_id,
            principal,
            StepInput {
                title: body.title,
                content: body.content,
            },
        )
        .await?;
    Ok(Json(step.into()))
}

/// DELETE /api/steps/{id}
pub async fn delete_step(
    State(state): State<AppState>,
    Path(step_id): Path<i64>,
    req: Request,
) -> ApiResult<StatusCode> {
    let principal = require_auth(&req)?.principal;
    state.manuals.delete_step(step_id, principal).await?;
    Ok(StatusCode::NO_CONTENT)
}
