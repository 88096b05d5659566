//! Server test utilities.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use guideforge_core::config::{AppConfig, MetadataConfig, StorageConfig};
use guideforge_metadata::{MetadataStore, SqliteStore};
use guideforge_server::{AppState, create_router};
use guideforge_storage::{BlobStore, FilesystemBackend};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    /// Concrete handle on the metadata store, for fault injection.
    pub sqlite: Arc<SqliteStore>,
    pub storage_root: PathBuf,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary storage.
    pub async fn new() -> Self {
        Self::build(|_| {}, |store| store).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        Self::build(modifier, |store| store).await
    }

    /// Create a test server whose blob store is wrapped, e.g. to inject faults.
    pub async fn with_blob_store<W>(wrap: W) -> Self
    where
        W: FnOnce(Arc<dyn BlobStore>) -> Arc<dyn BlobStore>,
    {
        Self::build(|_| {}, wrap).await
    }

    async fn build<F, W>(modifier: F, wrap: W) -> Self
    where
        F: FnOnce(&mut AppConfig),
        W: FnOnce(Arc<dyn BlobStore>) -> Arc<dyn BlobStore>,
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let storage_root = temp_dir.path().join("uploads");
        let backend: Arc<dyn BlobStore> = Arc::new(
            FilesystemBackend::new(&storage_root)
                .await
                .expect("Failed to create storage backend"),
        );
        let storage = wrap(backend);

        let db_path = temp_dir.path().join("guideforge.db");
        let sqlite = Arc::new(
            SqliteStore::new(&db_path)
                .await
                .expect("Failed to create metadata store"),
        );
        let metadata: Arc<dyn MetadataStore> = sqlite.clone();

        let mut config = AppConfig::for_testing();
        config.storage = StorageConfig::Filesystem {
            path: storage_root.clone(),
        };
        config.metadata = MetadataConfig::Sqlite { path: db_path };
        modifier(&mut config);

        let state = AppState::new(config, storage, metadata);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            sqlite,
            storage_root,
            _temp_dir: temp_dir,
        }
    }

    /// Get access to the underlying metadata.
    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.state.metadata.clone()
    }

    /// Send a JSON request and decode the JSON response (Null when empty).
    pub async fn json_request(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        auth_token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(token) = auth_token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }

        let body = match body {
            Some(v) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(serde_json::to_vec(&v).unwrap())
            }
            None => Body::empty(),
        };

        let (status, bytes) = self.send(builder.body(body).unwrap()).await;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Send a raw body with the given content type.
    pub async fn raw_request(
        &self,
        method: &str,
        uri: &str,
        content_type: &str,
        body: Vec<u8>,
        auth_token: Option<&str>,
    ) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", content_type);
        if let Some(token) = auth_token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(body)).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    /// Whether a blob exists on disk under the upload root.
    pub fn blob_exists(&self, key: &str) -> bool {
        self.storage_root.join(key).exists()
    }
}
