//! Shared test helpers for integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use sqlx::sqlite::SqlitePoolOptions;
use tempfile::TempDir;
use tower::ServiceExt;

use filedrop::config::{AppConfig, Args};
use filedrop::models::object::StoredObject;
use filedrop::services::catalog::Catalog;
use filedrop::services::notifier::{Notifier, NotifyError, UploadNotice};
use filedrop::services::object_store::{
    ByteStream, LocalObjectStore, ObjectStore, ObjectStoreError, ObjectStoreResult,
};
use filedrop::services::seen::MemorySessionStore;
use filedrop::state::AppState;

pub const BUCKET: &str = "files";

/// Notifier that remembers what it was asked to send.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<UploadNotice>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<UploadNotice> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notice: &UploadNotice) -> Result<(), NotifyError> {
        if self.fail {
            let err = "relay unreachable"
                .parse::<lettre::message::Mailbox>()
                .unwrap_err();
            return Err(NotifyError::Address(err));
        }
        self.sent.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

/// Object store whose writes always fail.
#[derive(Debug, Default)]
pub struct BrokenObjectStore {
    pub known_length_only: bool,
}

#[async_trait]
impl ObjectStore for BrokenObjectStore {
    fn backend(&self) -> &str {
        "broken"
    }

    fn supports_unknown_length(&self) -> bool {
        !self.known_length_only
    }

    async fn put(
        &self,
        _bucket: &str,
        _key: &str,
        _content: ByteStream<'_>,
        _size: Option<u64>,
    ) -> ObjectStoreResult<StoredObject> {
        Err(ObjectStoreError::Io(std::io::Error::other("quota exceeded")))
    }

    async fn get(
        &self,
        bucket: &str,
        key: &str,
    ) -> ObjectStoreResult<(StoredObject, ByteStream<'static>)> {
        Err(ObjectStoreError::ObjectNotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    async fn list(&self, _bucket: &str) -> ObjectStoreResult<Vec<StoredObject>> {
        Ok(Vec::new())
    }

    async fn health_check(&self) -> ObjectStoreResult<()> {
        Err(ObjectStoreError::Io(std::io::Error::other("offline")))
    }
}

/// Test application context
pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub store: Arc<LocalObjectStore>,
    pub notifier: Arc<RecordingNotifier>,
    _dir: TempDir,
}

impl TestApp {
    /// In-memory catalog, temp-dir object store, recording notifier.
    pub async fn new() -> Self {
        Self::build(None, RecordingNotifier::default()).await
    }

    pub async fn with_failing_notifier() -> Self {
        Self::build(None, RecordingNotifier::failing()).await
    }

    /// Route writes through `objects` instead of the temp-dir store.
    pub async fn with_object_store(objects: Arc<dyn ObjectStore>) -> Self {
        Self::build(Some(objects), RecordingNotifier::default()).await
    }

    async fn build(objects: Option<Arc<dyn ObjectStore>>, notifier: RecordingNotifier) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let (mut cfg, _) =
            AppConfig::resolve(Args::default(), |_| None).expect("Failed to build config");
        cfg.storage_dir = dir.path().display().to_string();
        cfg.public_url = "http://localhost:8080/objects".into();

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory database");
        let catalog = Catalog::new(Arc::new(pool));
        catalog.migrate().await.expect("Failed to run migrations");

        let store = Arc::new(LocalObjectStore::new(dir.path()));
        store
            .ensure_bucket(BUCKET)
            .await
            .expect("Failed to create bucket");
        let objects = objects.unwrap_or_else(|| store.clone());

        let notifier = Arc::new(notifier);
        let sessions = Arc::new(MemorySessionStore::new(cfg.session_ttl, 1_000));
        let state = AppState::new(catalog, objects, notifier.clone(), sessions, &cfg);
        let router = filedrop::routes::routes::routes(cfg.max_upload_bytes).with_state(state.clone());

        Self {
            state,
            router,
            store,
            notifier,
            _dir: dir,
        }
    }

    pub async fn file_count(&self) -> i64 {
        self.state.catalog.count().await.expect("Failed to count files")
    }

    /// Make an HTTP request to the test app
    pub async fn request(&self, req: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(String::from);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body")
            .to_vec();

        TestResponse {
            status,
            location,
            cookie,
            body,
        }
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> TestResponse {
        let mut req = Request::builder().method("GET").uri(path);
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        self.request(req.body(Body::empty()).expect("Failed to build request"))
            .await
    }

    /// POST a single-part multipart form to `/upload`.
    pub async fn upload(&self, field: &str, filename: &str, content: &[u8]) -> TestResponse {
        let boundary = "filedrop-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let req = Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .expect("Failed to build request");
        self.request(req).await
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    /// `name=value` of the first Set-Cookie header, if any.
    pub cookie: Option<String>,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("Response body is not JSON")
    }
}

/// Single-chunk stream over owned bytes.
pub fn bytes_stream(content: &[u8]) -> ByteStream<'static> {
    let chunk = bytes::Bytes::copy_from_slice(content);
    Box::pin(futures::stream::iter(vec![Ok(chunk)]))
}

/// Drain a stream into a byte vector.
pub async fn collect(stream: ByteStream<'static>) -> Vec<u8> {
    use futures::TryStreamExt;
    let chunks: Vec<bytes::Bytes> = stream.try_collect().await.expect("Failed to read stream");
    chunks.concat()
}
