//! Application state.

use crate::services::{AuthService, ManualService, UserService};
use guideforge_core::TokenIssuer;
use guideforge_core::config::AppConfig;
use guideforge_metadata::MetadataStore;
use guideforge_storage::BlobStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Blob store for image bytes.
    pub storage: Arc<dyn BlobStore>,
    /// Metadata store.
    pub metadata: Arc<dyn MetadataStore>,
    pub manuals: ManualService,
    pub users: UserService,
    pub auth: AuthService,
}

impl AppState {
    /// Create new application state, wiring the services over the stores.
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        let max_upload_size = config.upload.max_upload_size;
        let tokens = TokenIssuer::from_config(&config.auth);

        let manuals = ManualService::new(metadata.clone(), storage.clone(), max_upload_size);
        let users = UserService::new(
            metadata.clone(),
            storage.clone(),
            manuals.clone(),
            max_upload_size,
        );
        let auth = AuthService::new(metadata.clone(), tokens);

        Self {
            config: Arc::new(config),
            storage,
            metadata,
            manuals,
            users,
            auth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guideforge_metadata::SqliteStore;
    use guideforge_storage::FilesystemBackend;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_services_share_the_configured_secret() {
        let temp = tempdir().unwrap();
        let storage: Arc<dyn BlobStore> =
            Arc::new(FilesystemBackend::new(temp.path().join("uploads")).await.unwrap());
        let metadata: Arc<dyn MetadataStore> =
            Arc::new(SqliteStore::new(temp.path().join("guideforge.db")).await.unwrap());

        let mut config = AppConfig::for_testing();
        config.auth.jwt_secret = "a-secret-that-is-long-enough-for-tests".to_string();
        let state = AppState::new(config.clone(), storage, metadata);

        let token = TokenIssuer::from_config(&config.auth).issue(7, "a@b.io").unwrap();
        let claims = state.auth.verify_token(&token).unwrap();
        assert_eq!(claims.user_id, 7);
    }
}
