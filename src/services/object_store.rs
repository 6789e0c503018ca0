//! Object store adapter.
//!
//! [`ObjectStore`] is the seam the ingestion pipeline writes through.
//! [`LocalObjectStore`] keeps object payloads on local disk, sharded beneath
//! `base_path/{bucket}/{shard}/{shard}/{key}`. Writes stream into a temp file
//! which is fsynced and then renamed into place, so an object either exists
//! in full or not at all.

use crate::models::object::StoredObject;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use md5::Context;
use std::{
    fmt,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    pin::Pin,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tokio_util::io::ReaderStream;
use tracing::debug;
use uuid::Uuid;

/// A byte stream used for object payloads in both directions.
pub type ByteStream<'a> = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("invalid object key")]
    InvalidObjectKey,
    #[error("declared size {expected}B does not match {actual}B received")]
    SizeMismatch { expected: u64, actual: u64 },
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;

/// Durable blob storage addressed by bucket + key.
///
/// Implementations must be safe for concurrent puts from independent
/// requests without any locking by the caller.
#[async_trait]
pub trait ObjectStore: Send + Sync + fmt::Debug + 'static {
    /// Backend name for logs and readiness output (e.g. "local").
    fn backend(&self) -> &str;

    /// Whether `put` accepts streams whose length is not known up front.
    fn supports_unknown_length(&self) -> bool {
        true
    }

    /// Store `content` under `bucket/key`, returning once the object is
    /// durably written. When `size` is given, a stream of any other length
    /// is rejected and nothing is stored.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content: ByteStream<'_>,
        size: Option<u64>,
    ) -> ObjectStoreResult<StoredObject>;

    /// Open an object for reading.
    async fn get(&self, bucket: &str, key: &str)
    -> ObjectStoreResult<(StoredObject, ByteStream<'static>)>;

    /// List every object in a bucket, ordered by key.
    async fn list(&self, bucket: &str) -> ObjectStoreResult<Vec<StoredObject>>;

    /// Check that the backend can be written to and read from.
    async fn health_check(&self) -> ObjectStoreResult<()>;
}

/// Keys become file names, so they share the usual 255-byte name limit.
pub const MAX_OBJECT_KEY_LEN: usize = 255;
const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;
const TMP_PREFIX: &str = ".tmp-";

/// Object store backed by the local filesystem.
#[derive(Clone, Debug)]
pub struct LocalObjectStore {
    /// Base directory on disk where object payloads are stored.
    base_path: PathBuf,
}

impl LocalObjectStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Create the bucket directory if it does not exist yet.
    pub async fn ensure_bucket(&self, bucket: &str) -> ObjectStoreResult<()> {
        ensure_bucket_name_safe(bucket)?;
        fs::create_dir_all(self.bucket_root(bucket)).await?;
        Ok(())
    }

    fn bucket_root(&self, bucket_name: &str) -> PathBuf {
        let mut path = self.base_path.clone();
        path.push(bucket_name);
        path
    }

    /// Two-level shard directories from MD5(bucket/key), keeping the number of
    /// files per directory small.
    fn object_shards(bucket_name: &str, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", bucket_name, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn object_path(&self, bucket_name: &str, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(bucket_name, key);
        let mut path = self.bucket_root(bucket_name);
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    async fn describe(&self, bucket: &str, key: &str, path: &Path) -> io::Result<StoredObject> {
        let meta = fs::metadata(path).await?;
        let last_modified = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Ok(StoredObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size_bytes: meta.len() as i64,
            etag: None,
            last_modified,
        })
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    fn backend(&self) -> &str {
        "local"
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        mut content: ByteStream<'_>,
        size: Option<u64>,
    ) -> ObjectStoreResult<StoredObject> {
        ensure_bucket_name_safe(bucket)?;
        ensure_key_safe(key)?;

        let file_path = self.object_path(bucket, key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            ObjectStoreError::Io(io::Error::other("object path missing parent directory"))
        })?;
        fs::create_dir_all(&parent).await?;

        let tmp = TempFile::new(parent.join(format!("{TMP_PREFIX}{}", Uuid::new_v4())));
        let mut file = File::create(tmp.path()).await?;

        let mut written: u64 = 0;
        let mut digest = Context::new();
        while let Some(chunk) = content.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            digest.consume(&chunk);
            file.write_all(&chunk).await?;
        }
        if let Some(expected) = size {
            if expected != written {
                return Err(ObjectStoreError::SizeMismatch {
                    expected,
                    actual: written,
                });
            }
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        if let Err(err) = fs::rename(tmp.path(), &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(tmp.path(), &file_path).await?;
            } else {
                return Err(ObjectStoreError::Io(err));
            }
        }
        tmp.disarm();
        debug!("stored {} bytes at {}", written, file_path.display());

        Ok(StoredObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size_bytes: written as i64,
            etag: Some(format!("{:x}", digest.compute())),
            last_modified: Utc::now(),
        })
    }

    async fn get(
        &self,
        bucket: &str,
        key: &str,
    ) -> ObjectStoreResult<(StoredObject, ByteStream<'static>)> {
        ensure_bucket_name_safe(bucket)?;
        ensure_key_safe(key)?;

        let file_path = self.object_path(bucket, key);
        let not_found = |err: io::Error| {
            if err.kind() == ErrorKind::NotFound {
                ObjectStoreError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }
            } else {
                ObjectStoreError::Io(err)
            }
        };
        let file = File::open(&file_path).await.map_err(not_found)?;
        let object = self
            .describe(bucket, key, &file_path)
            .await
            .map_err(not_found)?;

        Ok((object, Box::pin(ReaderStream::new(file))))
    }

    async fn list(&self, bucket: &str) -> ObjectStoreResult<Vec<StoredObject>> {
        ensure_bucket_name_safe(bucket)?;
        let root = self.bucket_root(bucket);
        let mut shards_a = match fs::read_dir(&root).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(ObjectStoreError::BucketNotFound(bucket.to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        let mut objects = Vec::new();
        while let Some(a) = shards_a.next_entry().await? {
            if !a.file_type().await?.is_dir() {
                continue;
            }
            let mut shards_b = fs::read_dir(a.path()).await?;
            while let Some(b) = shards_b.next_entry().await? {
                if !b.file_type().await?.is_dir() {
                    continue;
                }
                let mut entries = fs::read_dir(b.path()).await?;
                while let Some(entry) = entries.next_entry().await? {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    if name.starts_with(TMP_PREFIX) || !entry.file_type().await?.is_file() {
                        continue;
                    }
                    objects.push(self.describe(bucket, &name, &entry.path()).await?);
                }
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn health_check(&self) -> ObjectStoreResult<()> {
        fs::create_dir_all(&self.base_path).await?;
        let probe = TempFile::new(self.base_path.join(format!(".readyz-{}", Uuid::new_v4())));
        fs::write(probe.path(), b"readyz").await?;
        let bytes = fs::read(probe.path()).await?;
        if bytes != b"readyz" {
            return Err(ObjectStoreError::Io(io::Error::new(
                ErrorKind::InvalidData,
                "file content mismatch",
            )));
        }
        Ok(())
    }
}

/// Removes its file on drop unless disarmed.
///
/// Covers both error returns and a dropped upload future (client went away),
/// so a half-written payload never lingers next to committed objects.
struct TempFile {
    path: PathBuf,
    armed: bool,
}

impl TempFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.armed {
            if let Err(err) = std::fs::remove_file(&self.path) {
                if err.kind() != ErrorKind::NotFound {
                    debug!("failed to remove temp file {}: {}", self.path.display(), err);
                }
            }
        }
    }
}

/// Basic key validation against path traversal.
///
/// Keys are flat: no separators of either kind and no control bytes, and a
/// key may not be `.` or `..` itself. Dots inside a name are fine.
fn ensure_key_safe(key: &str) -> ObjectStoreResult<()> {
    if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
        return Err(ObjectStoreError::InvalidObjectKey);
    }
    if key.starts_with(TMP_PREFIX) || key == "." || key == ".." {
        return Err(ObjectStoreError::InvalidObjectKey);
    }
    if key
        .bytes()
        .any(|b| b.is_ascii_control() || b == b'/' || b == b'\\')
    {
        return Err(ObjectStoreError::InvalidObjectKey);
    }
    Ok(())
}

/// Validate bucket name format.
///
/// S3-like rules:
/// - 3–63 characters
/// - lowercase letters, digits, dots, hyphens only
/// - cannot start/end with dot or hyphen
/// - cannot contain consecutive dots or dot-hyphen patterns
/// - cannot look like an IPv4 address
fn ensure_bucket_name_safe(name: &str) -> ObjectStoreResult<()> {
    let invalid = |reason: &str| ObjectStoreError::InvalidBucketName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let len = name.len();
    if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&len) {
        return Err(invalid("must be between 3 and 63 characters"));
    }
    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
    {
        return Err(invalid(
            "allowed characters are lowercase letters, digits, dots, and hyphens",
        ));
    }
    if name.starts_with(['.', '-']) || name.ends_with(['.', '-']) {
        return Err(invalid("must start and end with a lowercase letter or digit"));
    }
    if name.contains("..") || name.contains("-.") || name.contains(".-") {
        return Err(invalid(
            "cannot contain consecutive dots or dot-hyphen combinations",
        ));
    }
    if is_ipv4_like(name) {
        return Err(invalid("must not be formatted like an IP address"));
    }
    Ok(())
}

/// Check if a string matches IPv4-like dotted decimal form.
fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|segment| {
            !segment.is_empty()
                && segment.len() <= 3
                && segment.chars().all(|c| c.is_ascii_digit())
                && segment.parse::<u8>().is_ok()
        })
}
