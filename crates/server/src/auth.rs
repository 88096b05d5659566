//! Bearer token authentication middleware.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use guideforge_core::Principal;
use tracing::Instrument;

/// Authenticated request extension.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub principal: Principal,
    pub email: String,
}

/// Extract bearer token from Authorization header.
/// Per RFC 6750, the "Bearer" scheme is case-insensitive.
fn extract_bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            if v.len() >= 7 && v[..7].eq_ignore_ascii_case("bearer ") {
                Some(v[7..].trim())
            } else {
                None
            }
        })
}

/// Validates a bearer token when one is present.
///
/// Requests without a token pass through unauthenticated; handlers that need
/// a user call [`require_auth`]. A token that is present but invalid or
/// expired is rejected here.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = match extract_bearer_token(&req) {
        Some(token) => {
            let claims = state.auth.verify_token(token)?;
            Some(AuthenticatedUser {
                principal: claims.principal(),
                email: claims.email,
            })
        }
        None => None,
    };

    let span = match &user {
        Some(user) => tracing::info_span!("request", user_id = %user.principal),
        None => tracing::info_span!("request", user_id = tracing::field::Empty),
    };
    if let Some(user) = user {
        req.extensions_mut().insert(user);
    }

    Ok(next.run(req).instrument(span).await)
}

/// Require authentication (token must be present).
pub fn require_auth(req: &Request) -> ApiResult<&AuthenticatedUser> {
    req.extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::Unauthorized("authentication required".to_string()))
}
