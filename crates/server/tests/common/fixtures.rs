//! Test fixtures for generating test data.

use bytes::Bytes;
use guideforge_core::Principal;
use guideforge_metadata::models::{ImageRow, ManualRow, StepRow};
use guideforge_server::AppState;
use guideforge_server::services::{ManualInput, Registration, StepInput, Upload};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating unique emails.
static USER_COUNTER: AtomicU64 = AtomicU64::new(1);

/// A registered user and a valid token for it.
#[allow(dead_code)]
pub struct TestUser {
    pub principal: Principal,
    pub email: String,
    pub token: String,
}

/// Register a fresh user through the auth service.
#[allow(dead_code)]
pub async fn register_user(state: &AppState, username: &str) -> TestUser {
    let n = USER_COUNTER.fetch_add(1, Ordering::Relaxed);
    let email = format!("{username}.{n}@example.com");
    let session = state
        .auth
        .register(Registration {
            username: username.to_string(),
            email: email.clone(),
            password: "correct horse".to_string(),
        })
        .await
        .expect("Failed to register user");
    TestUser {
        principal: Principal(session.user.id),
        email,
        token: session.token,
    }
}

#[allow(dead_code)]
pub fn manual_input(title: &str, is_public: bool) -> ManualInput {
    ManualInput {
        title: title.to_string(),
        description: format!("{title} description"),
        category: "testing".to_string(),
        is_public,
    }
}

#[allow(dead_code)]
pub async fn create_manual(state: &AppState, owner: Principal, title: &str) -> ManualRow {
    state
        .manuals
        .create_manual(owner, manual_input(title, false))
        .await
        .expect("Failed to create manual")
}

#[allow(dead_code)]
pub async fn append_step(
    state: &AppState,
    owner: Principal,
    manual_id: i64,
    title: &str,
) -> StepRow {
    state
        .manuals
        .create_step(
            manual_id,
            owner,
            StepInput {
                title: title.to_string(),
                content: format!("{title} content"),
            },
            None,
        )
        .await
        .expect("Failed to create step")
}

#[allow(dead_code)]
pub async fn upload_png(
    state: &AppState,
    owner: Principal,
    step_id: i64,
    file_name: &str,
) -> ImageRow {
    state
        .manuals
        .upload_image(step_id, owner, png_upload(file_name))
        .await
        .expect("Failed to upload image")
}

#[allow(dead_code)]
pub fn png_upload(file_name: &str) -> Upload {
    Upload {
        file_name: file_name.to_string(),
        mime_type: Some("image/png".to_string()),
        data: png_bytes(),
    }
}

/// A tiny PNG-looking payload.
#[allow(dead_code)]
pub fn png_bytes() -> Bytes {
    Bytes::from_static(b"\x89PNG\r\n\x1a\n fake image data")
}

/// `(title, order_number)` pairs of a manual's steps, in listing order.
#[allow(dead_code)]
pub async fn step_orders(state: &AppState, manual_id: i64) -> Vec<(String, i32)> {
    state
        .metadata
        .list_steps(manual_id)
        .await
        .expect("Failed to list steps")
        .into_iter()
        .map(|s| (s.title, s.order_number))
        .collect()
}

/// Owned `(title, order_number)` pairs for comparing with [`step_orders`].
#[allow(dead_code)]
pub fn pairs(expected: &[(&str, i32)]) -> Vec<(String, i32)> {
    expected
        .iter()
        .map(|(title, order)| (title.to_string(), *order))
        .collect()
}
