//! HTTP API server for guideforge.
//!
//! This crate provides:
//! - The lifecycle services for manuals, steps, images, users and sessions
//! - The axum router, handlers and bearer-token middleware
//! - Prometheus metrics

pub mod auth;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod services;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
