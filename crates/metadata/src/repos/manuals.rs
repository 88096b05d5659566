//! Manual repository trait.

use crate::error::MetadataResult;
use crate::models::{ManualDeleteStats, ManualRow, ManualUpdate, NewManual};
use async_trait::async_trait;

/// Repository for manuals.
#[async_trait]
pub trait ManualRepo: Send + Sync {
    async fn create_manual(&self, manual: &NewManual) -> MetadataResult<ManualRow>;

    async fn get_manual(&self, manual_id: i64) -> MetadataResult<Option<ManualRow>>;

    async fn update_manual(
        &self,
        manual_id: i64,
        update: &ManualUpdate,
    ) -> MetadataResult<ManualRow>;

    /// Delete a manual with its steps and image rows in one transaction.
    /// Blobs are not touched.
    async fn delete_manual(&self, manual_id: i64) -> MetadataResult<ManualDeleteStats>;

    /// A user's manuals, most recently updated first.
    async fn list_manuals_by_user(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> MetadataResult<Vec<ManualRow>>;

    async fn count_manuals_by_user(&self, user_id: i64) -> MetadataResult<i64>;

    /// Ids of every manual a user owns.
    async fn list_manual_ids_by_user(&self, user_id: i64) -> MetadataResult<Vec<i64>>;

    /// Public manuals of all users, most recently updated first.
    async fn list_public_manuals(&self, limit: i64, offset: i64)
    -> MetadataResult<Vec<ManualRow>>;

    async fn count_public_manuals(&self) -> MetadataResult<i64>;
}
