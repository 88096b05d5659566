//! Route configuration.

use crate::auth::auth_middleware;
use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::middleware;
use axum::routing::{get, post, put};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Unauthenticated
        .route("/api/health", get(handlers::health_check))
        .route("/api/users", post(handlers::register))
        .route("/api/login", post(handlers::login))
        // Current user
        .route(
            "/api/users/me",
            get(handlers::get_me)
                .put(handlers::update_me)
                .delete(handlers::delete_me),
        )
        .route("/api/users/me/password", put(handlers::change_password))
        .route(
            "/api/users/me/profile-image",
            post(handlers::upload_profile_image),
        )
        // Manuals
        .route(
            "/api/manuals",
            get(handlers::list_my_manuals).post(handlers::create_manual),
        )
        .route("/api/manuals/public", get(handlers::list_public_manuals))
        .route(
            "/api/manuals/{id}",
            get(handlers::get_manual)
                .put(handlers::update_manual)
                .delete(handlers::delete_manual),
        )
        // Steps
        .route(
            "/api/manuals/{id}/steps",
            get(handlers::list_steps).post(handlers::create_step),
        )
        .route(
            "/api/manuals/{id}/steps/order",
            put(handlers::update_step_order),
        )
        .route(
            "/api/steps/{id}",
            put(handlers::update_step).delete(handlers::delete_step),
        )
        // Images
        .route("/api/steps/{id}/images", post(handlers::upload_image))
        .route(
            "/api/images/{id}",
            get(handlers::get_image).delete(handlers::delete_image),
        );

    let mut router = Router::new().merge(api_routes);

    // SECURITY: when enabled, network-restrict this endpoint to the scraper.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    let cors = cors_layer(&state.config.server.allow_origins);

    // Order of execution: Trace -> CORS -> Auth -> Handler
    router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allow_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allow_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}
