//! Database models mapping to the metadata schema.

use guideforge_core::{OwnedResource, StepOrder};
use sqlx::FromRow;
use time::OffsetDateTime;

// =============================================================================
// Users
// =============================================================================

/// User account record.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string. Never leaves the service layer.
    pub password_hash: String,
    /// Blob key of the profile picture, if one was uploaded.
    pub profile_image: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Full replacement of a user's mutable profile fields.
#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub username: String,
    pub email: String,
    pub profile_image: Option<String>,
}

// =============================================================================
// Manuals
// =============================================================================

/// Manual record. `user_id` never changes after creation.
#[derive(Debug, Clone, FromRow)]
pub struct ManualRow {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub is_public: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl OwnedResource for ManualRow {
    fn resource_id(&self) -> i64 {
        self.id
    }

    fn owner_id(&self) -> i64 {
        self.user_id
    }

    fn is_public(&self) -> bool {
        self.is_public
    }
}

#[derive(Debug, Clone)]
pub struct NewManual {
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub is_public: bool,
}

/// Mutable manual fields.
#[derive(Debug, Clone)]
pub struct ManualUpdate {
    pub title: String,
    pub description: String,
    pub category: String,
    pub is_public: bool,
}

/// Row counts removed alongside a manual.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManualDeleteStats {
    pub steps: u64,
    pub images: u64,
}

// =============================================================================
// Steps
// =============================================================================

/// Step record. `order_number` is contiguous `0..count-1` within a manual.
#[derive(Debug, Clone, FromRow)]
pub struct StepRow {
    pub id: i64,
    pub manual_id: i64,
    pub order_number: i32,
    pub title: String,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl StepRow {
    pub fn order(&self) -> StepOrder {
        StepOrder::new(self.id, self.order_number)
    }
}

#[derive(Debug, Clone)]
pub struct NewStep {
    pub manual_id: i64,
    pub title: String,
    pub content: String,
    /// Insert position. `None` appends after the last step.
    pub order_number: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct StepUpdate {
    pub title: String,
    pub content: String,
}

// =============================================================================
// Images
// =============================================================================

/// Image record. Rows are written only after the blob at `file_path` exists.
#[derive(Debug, Clone, FromRow)]
pub struct ImageRow {
    pub id: i64,
    pub step_id: i64,
    pub file_path: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewImage {
    pub step_id: i64,
    pub file_path: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
}
