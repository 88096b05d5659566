//! Registration, login and health endpoints.

use crate::error::ApiResult;
use crate::handlers::common::{UserResponse, read_json};
use crate::services::{Registration, Session};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Issued token plus the user it identifies.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub user: UserResponse,
}

impl From<Session> for AuthResponse {
    fn from(session: Session) -> Self {
        Self {
            token: session.token,
            token_type: "Bearer",
            expires_in: session.expires_in,
            user: session.user.into(),
        }
    }
}

/// POST /api/users - Register a new account.
pub async fn register(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let body: RegisterRequest =
        read_json(req.into_body(), state.config.server.max_json_body_size).await?;
    let session = state
        .auth
        .register(Registration {
            username: body.username,
            email: body.email,
            password: body.password,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

/// POST /api/login - Exchange credentials for a token.
pub async fn login(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<AuthResponse>> {
    let body: LoginRequest =
        read_json(req.into_body(), state.config.server.max_json_body_size).await?;
    let session = state.auth.login(&body.email, &body.password).await?;
    Ok(Json(session.into()))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub metadata: &'static str,
    pub storage: &'static str,
}

/// GET /api/health - Check both stores.
pub async fn health_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let metadata_ok = match state.metadata.health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Metadata health check failed");
            false
        }
    };
    let storage_ok = match state.storage.health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Storage health check failed");
            false
        }
    };

    let label = |ok: bool| if ok { "ok" } else { "unavailable" };
    let status = if metadata_ok && storage_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(HealthResponse {
            status: label(metadata_ok && storage_ok),
            metadata: label(metadata_ok),
            storage: label(storage_ok),
        }),
    )
}
