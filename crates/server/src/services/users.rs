//! User profile management and account deletion.

use crate::services::error::{ServiceError, ServiceResult};
use crate::services::manuals::{ManualService, Upload};
use crate::services::views::UserProfile;
use guideforge_core::Principal;
use guideforge_core::paths::{profile_image_key, sanitize_file_name};
use guideforge_core::validation::{validate_email, validate_username};
use guideforge_metadata::models::{UserRow, UserUpdate};
use guideforge_metadata::{MetadataError, MetadataStore};
use guideforge_storage::BlobStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Profile fields a user may change.
#[derive(Debug, Clone)]
pub struct ProfileInput {
    pub username: String,
    pub email: String,
}

/// Emails are compared case-insensitively.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[derive(Clone)]
pub struct UserService {
    metadata: Arc<dyn MetadataStore>,
    storage: Arc<dyn BlobStore>,
    manuals: ManualService,
    max_upload_size: u64,
}

impl UserService {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        storage: Arc<dyn BlobStore>,
        manuals: ManualService,
        max_upload_size: u64,
    ) -> Self {
        Self {
            metadata,
            storage,
            manuals,
            max_upload_size,
        }
    }

    pub async fn get_profile(&self, principal: Principal) -> ServiceResult<UserProfile> {
        self.load_user(principal).await.map(UserProfile::from)
    }

    pub async fn update_profile(
        &self,
        principal: Principal,
        input: ProfileInput,
    ) -> ServiceResult<UserProfile> {
        validate_username(&input.username)?;
        validate_email(&input.email)?;
        let user = self.load_user(principal).await?;
        let email = normalize_email(&input.email);

        let updated = self
            .metadata
            .update_user(
                user.id,
                &UserUpdate {
                    username: input.username.trim().to_string(),
                    email: email.clone(),
                    profile_image: user.profile_image,
                },
            )
            .await
            .map_err(|e| match e {
                MetadataError::AlreadyExists(_) => {
                    ServiceError::Conflict(format!("email {email} is already registered"))
                }
                other => ServiceError::metadata("updating profile", other),
            })?;
        Ok(updated.into())
    }

    /// Replace the profile picture. The previous blob is removed on a best
    /// effort basis once the new one is recorded.
    pub async fn update_profile_image(
        &self,
        principal: Principal,
        upload: Upload,
    ) -> ServiceResult<UserProfile> {
        if upload.data.is_empty() {
            return Err(ServiceError::InvalidArgument("file is empty".to_string()));
        }
        if upload.data.len() as u64 > self.max_upload_size {
            return Err(ServiceError::InvalidArgument(format!(
                "file is {} bytes, limit is {}",
                upload.data.len(),
                self.max_upload_size
            )));
        }
        let file_name = sanitize_file_name(&upload.file_name)?;
        let user = self.load_user(principal).await?;
        let key = profile_image_key(user.id, &file_name);

        self.storage
            .put(&key, upload.data)
            .await
            .map_err(|e| ServiceError::blob("writing profile image", e))?;

        let previous = user.profile_image.clone();
        let recorded = self
            .metadata
            .update_user(
                user.id,
                &UserUpdate {
                    username: user.username,
                    email: user.email,
                    profile_image: Some(key.clone()),
                },
            )
            .await;

        let updated = match recorded {
            Ok(row) => row,
            Err(e) => {
                if previous.as_deref() != Some(key.as_str())
                    && let Err(cleanup) = self.storage.delete(&key).await
                {
                    warn!(key = %key, error = %cleanup, "Failed to remove profile blob after update failed");
                }
                return Err(ServiceError::metadata("recording profile image", e));
            }
        };

        if let Some(old) = previous.filter(|old| *old != key)
            && let Err(e) = self.storage.delete(&old).await
            && !e.is_not_found()
        {
            warn!(key = %old, error = %e, "Failed to delete previous profile image");
        }
        Ok(updated.into())
    }

    /// Delete the account with every manual it owns. Blob cleanup is best
    /// effort; the rows always go.
    pub async fn delete_account(&self, principal: Principal) -> ServiceResult<()> {
        let user = self.load_user(principal).await?;
        let manual_ids = self
            .metadata
            .list_manual_ids_by_user(user.id)
            .await
            .map_err(|e| ServiceError::metadata("listing manuals", e))?;

        for manual_id in &manual_ids {
            match self.manuals.purge_manual(*manual_id).await {
                Ok(_) | Err(ServiceError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        if let Some(key) = &user.profile_image
            && let Err(e) = self.storage.delete(key).await
            && !e.is_not_found()
        {
            warn!(key = %key, error = %e, "Failed to delete profile image");
        }

        self.metadata
            .delete_user(user.id)
            .await
            .map_err(|e| ServiceError::metadata("deleting user", e))?;
        info!(user_id = user.id, manuals = manual_ids.len(), "Account deleted");
        Ok(())
    }

    async fn load_user(&self, principal: Principal) -> ServiceResult<UserRow> {
        self.metadata
            .get_user(principal.id())
            .await
            .map_err(|e| ServiceError::metadata("loading user", e))?
            .ok_or_else(|| ServiceError::NotFound(format!("user {principal}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }
}
