//! Image repository trait.

use crate::error::MetadataResult;
use crate::models::{ImageRow, NewImage};
use async_trait::async_trait;

/// Repository for step images.
#[async_trait]
pub trait ImageRepo: Send + Sync {
    async fn create_image(&self, image: &NewImage) -> MetadataResult<ImageRow>;

    async fn get_image(&self, image_id: i64) -> MetadataResult<Option<ImageRow>>;

    /// Images of one step in insertion order.
    async fn list_images_by_step(&self, step_id: i64) -> MetadataResult<Vec<ImageRow>>;

    /// Images of every step in a manual, grouped by step order then insertion order.
    async fn list_images_by_manual(&self, manual_id: i64) -> MetadataResult<Vec<ImageRow>>;

    async fn delete_image(&self, image_id: i64) -> MetadataResult<()>;
}
