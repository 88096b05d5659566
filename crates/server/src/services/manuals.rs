//! Manual, step and image lifecycle.
//!
//! Every operation resolves the target to its manual and runs the ownership
//! guard before touching anything. Steps and images are never trusted to
//! carry their owner: the chain image -> step -> manual is walked each time.

use crate::metrics;
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::views::{ManualDetail, StepDetail};
use bytes::Bytes;
use guideforge_core::paths::{sanitize_file_name, step_image_key};
use guideforge_core::validation::validate_title;
use guideforge_core::{
    Access, OrderingError, Page, PageRequest, Principal, StepOrder, authorize_manual,
};
use guideforge_metadata::models::{
    ImageRow, ManualDeleteStats, ManualRow, ManualUpdate, NewImage, NewManual, NewStep, StepRow,
    StepUpdate,
};
use guideforge_metadata::{MetadataError, MetadataStore};
use guideforge_storage::{BlobStore, StorageError};
use std::sync::Arc;
use tracing::{debug, info, warn};

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Caller-controlled manual fields.
#[derive(Debug, Clone, Default)]
pub struct ManualInput {
    pub title: String,
    pub description: String,
    pub category: String,
    pub is_public: bool,
}

/// Caller-controlled step fields.
#[derive(Debug, Clone, Default)]
pub struct StepInput {
    pub title: String,
    pub content: String,
}

/// An uploaded file.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub data: Bytes,
}

/// Lifecycle service for manuals and everything under them.
#[derive(Clone)]
pub struct ManualService {
    metadata: Arc<dyn MetadataStore>,
    storage: Arc<dyn BlobStore>,
    max_upload_size: u64,
}

impl ManualService {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        storage: Arc<dyn BlobStore>,
        max_upload_size: u64,
    ) -> Self {
        Self {
            metadata,
            storage,
            max_upload_size,
        }
    }

    // ---- manuals ----

    pub async fn create_manual(
        &self,
        owner: Principal,
        input: ManualInput,
    ) -> ServiceResult<ManualRow> {
        validate_title(&input.title)?;
        let manual = self
            .metadata
            .create_manual(&NewManual {
                user_id: owner.id(),
                title: input.title.trim().to_string(),
                description: input.description,
                category: input.category,
                is_public: input.is_public,
            })
            .await
            .map_err(|e| ServiceError::metadata("creating manual", e))?;
        metrics::MANUALS_CREATED.inc();
        info!(manual_id = manual.id, user_id = owner.id(), "Manual created");
        Ok(manual)
    }

    /// Load a manual with its steps and images. Private manuals are only
    /// visible to their owner.
    pub async fn get_manual(
        &self,
        manual_id: i64,
        requester: Principal,
    ) -> ServiceResult<ManualDetail> {
        let manual = self.manual_for(requester, manual_id, Access::Read).await?;
        let steps = self.step_details(manual_id).await?;
        Ok(ManualDetail { manual, steps })
    }

    pub async fn update_manual(
        &self,
        manual_id: i64,
        requester: Principal,
        input: ManualInput,
    ) -> ServiceResult<ManualRow> {
        validate_title(&input.title)?;
        self.manual_for(requester, manual_id, Access::Write).await?;
        self.metadata
            .update_manual(
                manual_id,
                &ManualUpdate {
                    title: input.title.trim().to_string(),
                    description: input.description,
                    category: input.category,
                    is_public: input.is_public,
                },
            )
            .await
            .map_err(|e| ServiceError::metadata("updating manual", e))
    }

    /// Delete a manual, its steps and images. Blob removal is best effort.
    pub async fn delete_manual(
        &self,
        manual_id: i64,
        requester: Principal,
    ) -> ServiceResult<ManualDeleteStats> {
        self.manual_for(requester, manual_id, Access::Write).await?;
        self.purge_manual(manual_id).await
    }

    /// Cascade for a manual whose owner has already been checked.
    pub(crate) async fn purge_manual(&self, manual_id: i64) -> ServiceResult<ManualDeleteStats> {
        let images = self
            .metadata
            .list_images_by_manual(manual_id)
            .await
            .map_err(|e| ServiceError::metadata("listing manual images", e))?;
        self.remove_blobs_best_effort(&images).await;

        let stats = self
            .metadata
            .delete_manual(manual_id)
            .await
            .map_err(|e| ServiceError::metadata("deleting manual", e))?;
        metrics::MANUALS_DELETED.inc();
        info!(
            manual_id,
            steps = stats.steps,
            images = stats.images,
            "Manual deleted"
        );
        Ok(stats)
    }

    pub async fn list_my_manuals(
        &self,
        requester: Principal,
        page: PageRequest,
    ) -> ServiceResult<Page<ManualRow>> {
        let total = self
            .metadata
            .count_manuals_by_user(requester.id())
            .await
            .map_err(|e| ServiceError::metadata("counting manuals", e))?;
        let items = self
            .metadata
            .list_manuals_by_user(requester.id(), page.limit, page.offset())
            .await
            .map_err(|e| ServiceError::metadata("listing manuals", e))?;
        Ok(Page::new(page, total, items))
    }

    pub async fn list_public_manuals(&self, page: PageRequest) -> ServiceResult<Page<ManualRow>> {
        let total = self
            .metadata
            .count_public_manuals()
            .await
            .map_err(|e| ServiceError::metadata("counting public manuals", e))?;
        let items = self
            .metadata
            .list_public_manuals(page.limit, page.offset())
            .await
            .map_err(|e| ServiceError::metadata("listing public manuals", e))?;
        Ok(Page::new(page, total, items))
    }

    // ---- steps ----

    pub async fn list_steps(
        &self,
        manual_id: i64,
        requester: Principal,
    ) -> ServiceResult<Vec<StepDetail>> {
        self.manual_for(requester, manual_id, Access::Read).await?;
        self.step_details(manual_id).await
    }

    /// Add a step. Without `position` it is appended; with one, it is
    /// inserted there and later steps move down.
    pub async fn create_step(
        &self,
        manual_id: i64,
        requester: Principal,
        input: StepInput,
        position: Option<i32>,
    ) -> ServiceResult<StepRow> {
        validate_title(&input.title)?;
        self.manual_for(requester, manual_id, Access::Write).await?;
        let step = self
            .metadata
            .insert_step(&NewStep {
                manual_id,
                title: input.title.trim().to_string(),
                content: input.content,
                order_number: position,
            })
            .await
            .map_err(|e| ServiceError::metadata("creating step", e))?;
        debug!(
            manual_id,
            step_id = step.id,
            order_number = step.order_number,
            "Step created"
        );
        Ok(step)
    }

    pub async fn update_step(
        &self,
        step_id: i64,
        requester: Principal,
        input: StepInput,
    ) -> ServiceResult<StepRow> {
        validate_title(&input.title)?;
        self.step_for(requester, step_id, Access::Write).await?;
        self.metadata
            .update_step(
                step_id,
                &StepUpdate {
                    title: input.title.trim().to_string(),
                    content: input.content,
                },
            )
            .await
            .map_err(|e| ServiceError::metadata("updating step", e))
    }

    /// Delete a step and close the gap it leaves in the order.
    pub async fn delete_step(&self, step_id: i64, requester: Principal) -> ServiceResult<StepRow> {
        self.step_for(requester, step_id, Access::Write).await?;
        let images = self
            .metadata
            .list_images_by_step(step_id)
            .await
            .map_err(|e| ServiceError::metadata("listing step images", e))?;
        self.remove_blobs_best_effort(&images).await;

        let step = self
            .metadata
            .delete_step_and_compact(step_id)
            .await
            .map_err(|e| ServiceError::metadata("deleting step", e))?;
        debug!(manual_id = step.manual_id, step_id, "Step deleted");
        Ok(step)
    }

    /// Apply a bulk reorder atomically. Returns the steps in their new order.
    pub async fn update_step_order(
        &self,
        manual_id: i64,
        requester: Principal,
        orders: &[StepOrder],
    ) -> ServiceResult<Vec<StepRow>> {
        self.manual_for(requester, manual_id, Access::Write).await?;
        self.metadata
            .reorder_steps(manual_id, orders)
            .await
            .map_err(|e| match e {
                MetadataError::Ordering(OrderingError::ForeignStep { step_id }) => {
                    ServiceError::ForeignStep { step_id, manual_id }
                }
                other => ServiceError::metadata("reordering steps", other),
            })
    }

    // ---- images ----

    /// Store an image for a step. The blob is written first; if recording the
    /// row fails the blob is removed again.
    pub async fn upload_image(
        &self,
        step_id: i64,
        requester: Principal,
        upload: Upload,
    ) -> ServiceResult<ImageRow> {
        let size = self.check_upload_size(&upload.data)?;
        let file_name = sanitize_file_name(&upload.file_name)?;
        let mime_type = upload
            .mime_type
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());

        let (manual, step) = self.step_for(requester, step_id, Access::Write).await?;
        let key = step_image_key(manual.id, step.id, &file_name);

        let taken = self
            .storage
            .exists(&key)
            .await
            .map_err(|e| ServiceError::blob("checking image path", e))?;
        if taken {
            return Err(ServiceError::Conflict(format!(
                "step {step_id} already has an image named {file_name}"
            )));
        }

        self.storage
            .put(&key, upload.data)
            .await
            .map_err(|e| ServiceError::blob("writing image", e))?;

        let recorded = self
            .metadata
            .create_image(&NewImage {
                step_id,
                file_path: key.clone(),
                file_name,
                file_size: size,
                mime_type,
            })
            .await;

        match recorded {
            Ok(image) => {
                metrics::IMAGES_UPLOADED.inc();
                metrics::BYTES_UPLOADED.inc_by(size.unsigned_abs());
                info!(step_id, image_id = image.id, size, "Image uploaded");
                Ok(image)
            }
            Err(e) => {
                metrics::IMAGE_UPLOAD_ROLLBACKS.inc();
                if let Err(cleanup) = self.storage.delete(&key).await {
                    warn!(key = %key, error = %cleanup, "Failed to remove blob after image insert failed");
                }
                Err(ServiceError::metadata("recording image", e))
            }
        }
    }

    /// Delete an image. A blob that is already gone is fine; any other blob
    /// error aborts before the row is touched.
    pub async fn delete_image(&self, image_id: i64, requester: Principal) -> ServiceResult<()> {
        let image = self.image_for(requester, image_id, Access::Write).await?;
        match self.storage.delete(&image.file_path).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(image_id, key = %image.file_path, "Image blob already absent");
            }
            Err(e) => return Err(ServiceError::blob("deleting image", e)),
        }
        self.metadata
            .delete_image(image_id)
            .await
            .map_err(|e| ServiceError::metadata("deleting image", e))
    }

    /// Read an image's bytes under the manual's read rule.
    pub async fn get_image_content(
        &self,
        image_id: i64,
        requester: Principal,
    ) -> ServiceResult<(ImageRow, Bytes)> {
        let image = self.image_for(requester, image_id, Access::Read).await?;
        let data = self
            .storage
            .get(&image.file_path)
            .await
            .map_err(|e| ServiceError::blob("reading image", e))?;
        Ok((image, data))
    }

    // ---- helpers ----

    fn check_upload_size(&self, data: &Bytes) -> ServiceResult<i64> {
        if data.is_empty() {
            return Err(ServiceError::InvalidArgument("file is empty".to_string()));
        }
        let size = data.len() as u64;
        if size > self.max_upload_size {
            return Err(ServiceError::InvalidArgument(format!(
                "file is {size} bytes, limit is {}",
                self.max_upload_size
            )));
        }
        i64::try_from(size)
            .map_err(|_| ServiceError::InvalidArgument("file is too large".to_string()))
    }

    async fn step_details(&self, manual_id: i64) -> ServiceResult<Vec<StepDetail>> {
        let steps = self
            .metadata
            .list_steps(manual_id)
            .await
            .map_err(|e| ServiceError::metadata("listing steps", e))?;
        let images = self
            .metadata
            .list_images_by_manual(manual_id)
            .await
            .map_err(|e| ServiceError::metadata("listing images", e))?;
        Ok(StepDetail::assemble(steps, images))
    }

    async fn remove_blobs_best_effort(&self, images: &[ImageRow]) {
        for image in images {
            match self.storage.delete(&image.file_path).await {
                Ok(()) => {}
                Err(StorageError::NotFound(_)) => {}
                Err(e) => {
                    metrics::BLOB_CLEANUP_FAILURES.inc();
                    warn!(
                        image_id = image.id,
                        key = %image.file_path,
                        error = %e,
                        "Failed to delete image blob, continuing"
                    );
                }
            }
        }
    }

    async fn manual_for(
        &self,
        principal: Principal,
        manual_id: i64,
        access: Access,
    ) -> ServiceResult<ManualRow> {
        let manual = self
            .metadata
            .get_manual(manual_id)
            .await
            .map_err(|e| ServiceError::metadata("loading manual", e))?
            .ok_or_else(|| ServiceError::NotFound(format!("manual {manual_id}")))?;
        authorize_manual(principal, &manual, access)?;
        Ok(manual)
    }

    async fn step_for(
        &self,
        principal: Principal,
        step_id: i64,
        access: Access,
    ) -> ServiceResult<(ManualRow, StepRow)> {
        let step = self
            .metadata
            .get_step(step_id)
            .await
            .map_err(|e| ServiceError::metadata("loading step", e))?
            .ok_or_else(|| ServiceError::NotFound(format!("step {step_id}")))?;
        let manual = self.manual_for(principal, step.manual_id, access).await?;
        Ok((manual, step))
    }

    async fn image_for(
        &self,
        principal: Principal,
        image_id: i64,
        access: Access,
    ) -> ServiceResult<ImageRow> {
        let image = self
            .metadata
            .get_image(image_id)
            .await
            .map_err(|e| ServiceError::metadata("loading image", e))?
            .ok_or_else(|| ServiceError::NotFound(format!("image {image_id}")))?;
        self.step_for(principal, image.step_id, access).await?;
        Ok(image)
    }
}
