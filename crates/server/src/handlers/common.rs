//! Shared handler helpers and response bodies.

use crate::error::{ApiError, ApiResult};
use crate::services::{ManualDetail, StepDetail, UserProfile};
use axum::body::Body;
use axum::extract::Request;
use axum::http::header::CONTENT_TYPE;
use bytes::Bytes;
use guideforge_metadata::models::{ImageRow, ManualRow, StepRow};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Read and parse a JSON body of at most `limit` bytes.
pub async fn read_json<T: DeserializeOwned>(body: Body, limit: usize) -> ApiResult<T> {
    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read body: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))
}

/// Read a raw upload body. The size limit itself is enforced by the services;
/// reading stops one byte past it.
pub async fn read_upload(body: Body, limit: u64) -> ApiResult<Bytes> {
    let read_limit = usize::try_from(limit.saturating_add(1)).unwrap_or(usize::MAX);
    axum::body::to_bytes(body, read_limit)
        .await
        .map_err(|e| ApiError::BadRequest(format!("upload exceeds {limit} bytes or failed: {e}")))
}

/// The request's Content-Type, if any.
pub fn content_type(req: &Request) -> Option<String> {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

/// Query string for raw uploads.
#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub filename: String,
}

/// Query string for list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub profile_image: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<UserProfile> for UserResponse {
    fn from(user: UserProfile) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            profile_image: user.profile_image,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ManualResponse {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub is_public: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<ManualRow> for ManualResponse {
    fn from(row: ManualRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            description: row.description,
            category: row.category,
            is_public: row.is_public,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A manual with its steps.
#[derive(Debug, Serialize)]
pub struct ManualDetailResponse {
    #[serde(flatten)]
    pub manual: ManualResponse,
    pub steps: Vec<StepResponse>,
}

impl From<ManualDetail> for ManualDetailResponse {
    fn from(detail: ManualDetail) -> Self {
        Self {
            manual: detail.manual.into(),
            steps: detail.steps.into_iter().map(StepResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StepResponse {
    pub id: i64,
    pub manual_id: i64,
    pub order_number: i32,
    pub title: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ImageResponse>>,
}

impl From<StepRow> for StepResponse {
    fn from(row: StepRow) -> Self {
        Self {
            id: row.id,
            manual_id: row.manual_id,
            order_number: row.order_number,
            title: row.title,
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
            images: None,
        }
    }
}

impl From<StepDetail> for StepResponse {
    fn from(detail: StepDetail) -> Self {
        let images = detail.images.into_iter().map(ImageResponse::from).collect();
        Self {
            images: Some(images),
            ..Self::from(detail.step)
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub id: i64,
    pub step_id: i64,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    /// Where the bytes can be fetched.
    pub url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<ImageRow> for ImageResponse {
    fn from(row: ImageRow) -> Self {
        Self {
            url: format!("/api/images/{}", row.id),
            id: row.id,
            step_id: row.step_id,
            file_name: row.file_name,
            file_size: row.file_size,
            mime_type: row.mime_type,
            created_at: row.created_at,
        }
    }
}
