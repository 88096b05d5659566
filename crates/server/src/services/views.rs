//! Read models returned by the services.

use guideforge_metadata::models::{ImageRow, ManualRow, StepRow, UserRow};
use std::collections::HashMap;
use time::OffsetDateTime;

/// A manual with its steps in order, each with its images.
#[derive(Debug, Clone)]
pub struct ManualDetail {
    pub manual: ManualRow,
    pub steps: Vec<StepDetail>,
}

/// A step with its images in insertion order.
#[derive(Debug, Clone)]
pub struct StepDetail {
    pub step: StepRow,
    pub images: Vec<ImageRow>,
}

impl StepDetail {
    /// Attach images to already ordered steps.
    pub(crate) fn assemble(steps: Vec<StepRow>, images: Vec<ImageRow>) -> Vec<StepDetail> {
        let mut by_step: HashMap<i64, Vec<ImageRow>> = HashMap::new();
        for image in images {
            by_step.entry(image.step_id).or_default().push(image);
        }
        steps
            .into_iter()
            .map(|step| {
                let mut images = by_step.remove(&step.id).unwrap_or_default();
                images.sort_by_key(|image| image.id);
                StepDetail { step, images }
            })
            .collect()
    }
}

/// A user without the credential hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub profile_image: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<UserRow> for UserProfile {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            profile_image: row.profile_image,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
