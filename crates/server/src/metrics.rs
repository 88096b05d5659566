//! Prometheus metrics for the guideforge server.
//!
//! # Security Note
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus scraping.
//! Metrics carry no user or manual identifiers, only aggregate counts.
//! Network-restrict the endpoint to the scraper when it is enabled.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static MANUALS_CREATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "guideforge_manuals_created_total",
        "Total number of manuals created",
    )
    .expect("metric creation failed")
});

pub static MANUALS_DELETED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "guideforge_manuals_deleted_total",
        "Total number of manuals deleted, including account deletions",
    )
    .expect("metric creation failed")
});

pub static IMAGES_UPLOADED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "guideforge_images_uploaded_total",
        "Total number of step images stored",
    )
    .expect("metric creation failed")
});

pub static BYTES_UPLOADED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "guideforge_bytes_uploaded_total",
        "Total bytes of step images stored",
    )
    .expect("metric creation failed")
});

pub static IMAGE_UPLOAD_ROLLBACKS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "guideforge_image_upload_rollbacks_total",
        "Uploads whose blob was removed because the image row could not be recorded",
    )
    .expect("metric creation failed")
});

pub static BLOB_CLEANUP_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "guideforge_blob_cleanup_failures_total",
        "Best-effort blob deletions that failed and left an orphaned blob",
    )
    .expect("metric creation failed")
});

pub static API_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("guideforge_api_errors_total", "API error responses by code"),
        &["code"],
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry. Safe to call repeatedly.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(MANUALS_CREATED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(MANUALS_DELETED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(IMAGES_UPLOADED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BYTES_UPLOADED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(IMAGE_UPLOAD_ROLLBACKS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BLOB_CLEANUP_FAILURES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(API_ERRORS.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus text format.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Count an error response.
pub fn record_api_error(code: &str) {
    API_ERRORS.with_label_values(&[code]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration_is_idempotent() {
        register_metrics();
        register_metrics();

        MANUALS_CREATED.inc();
        record_api_error("not_found");

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&REGISTRY.gather(), &mut buffer)
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("guideforge_manuals_created_total"));
        assert!(text.contains("guideforge_api_errors_total{code=\"not_found\"}"));
    }
}
