//! Step repository trait.
//!
//! Every operation that changes `order_number` runs in a single transaction
//! and keeps the manual's steps numbered `0..count-1`.

use crate::error::MetadataResult;
use crate::models::{NewStep, StepRow, StepUpdate};
use async_trait::async_trait;
use guideforge_core::StepOrder;

/// Repository for steps and their ordering.
#[async_trait]
pub trait StepRepo: Send + Sync {
    async fn get_step(&self, step_id: i64) -> MetadataResult<Option<StepRow>>;

    /// Steps of a manual by `order_number`, then id.
    async fn list_steps(&self, manual_id: i64) -> MetadataResult<Vec<StepRow>>;

    /// Overwrite title and content. Order is not affected.
    async fn update_step(&self, step_id: i64, update: &StepUpdate) -> MetadataResult<StepRow>;

    /// Insert a step.
    ///
    /// Without an explicit position the step is appended. With one, steps at
    /// or after that position shift up by one. Positions outside `0..=count`
    /// fail with `Ordering(PositionOutOfRange)`.
    async fn insert_step(&self, step: &NewStep) -> MetadataResult<StepRow>;

    /// Delete a step and its image rows, then close the gap it leaves.
    /// Returns the deleted row.
    async fn delete_step_and_compact(&self, step_id: i64) -> MetadataResult<StepRow>;

    /// Apply a bulk reorder. The request is validated against the manual's
    /// current steps before anything is written; on any error nothing changes.
    /// Returns the manual's steps in their new order.
    async fn reorder_steps(
        &self,
        manual_id: i64,
        orders: &[StepOrder],
    ) -> MetadataResult<Vec<StepRow>>;
}
