//! Ingestion pipeline: object write, then catalog insert, then notification.
//!
//! Each step runs only after the previous one succeeded, so a catalog row
//! never points at an object that was not durably written. Nothing is rolled
//! back: a catalog failure after a successful write leaves an orphaned object,
//! and a notification failure is reported even though the row exists.
//!
//! Dropping the future (client disconnect, timeout) abandons whichever step is
//! in flight; a partial object write is discarded by the store.

use crate::{
    models::file::{FileId, NewFile},
    services::{
        catalog::{Catalog, CatalogError},
        notifier::{Notifier, NotifyError, UploadNotice},
        object_store::{ByteStream, ObjectStore, ObjectStoreError},
    },
};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid upload: {0}")]
    Validation(String),
    #[error("object store write failed: {0}")]
    StorageWrite(#[source] ObjectStoreError),
    #[error("catalog insert failed for stored object `{key}`: {source}")]
    CatalogWrite {
        key: String,
        #[source]
        source: CatalogError,
    },
    #[error("file {id} was stored but the notification failed: {source}")]
    Notification {
        id: FileId,
        #[source]
        source: NotifyError,
    },
}

/// Turns an inbound byte stream into a stored object plus a catalog row.
#[derive(Clone, Debug)]
pub struct IngestPipeline {
    objects: Arc<dyn ObjectStore>,
    catalog: Catalog,
    notifier: Arc<dyn Notifier>,
    bucket: String,
    public_url: String,
}

impl IngestPipeline {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        catalog: Catalog,
        notifier: Arc<dyn Notifier>,
        bucket: impl Into<String>,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            objects,
            catalog,
            notifier,
            bucket: bucket.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Ingest one file and return its catalog id.
    ///
    /// `size` is the declared length; `None` streams a body of unknown length,
    /// which is only accepted when the object store supports it.
    pub async fn ingest(
        &self,
        name: &str,
        content: ByteStream<'_>,
        size: Option<u64>,
        notify: bool,
    ) -> Result<FileId, IngestError> {
        let name = display_name(name)?;
        if size.is_none() && !self.objects.supports_unknown_length() {
            return Err(IngestError::Validation(format!(
                "{} object store requires a known upload size",
                self.objects.backend()
            )));
        }

        let created_at = Utc::now();
        let key = object_key(created_at.timestamp_millis(), name);

        let stored = self
            .objects
            .put(&self.bucket, &key, content, size)
            .await
            .map_err(IngestError::StorageWrite)?;
        info!(bucket = %self.bucket, key = %stored.key, size = stored.size_bytes, "stored object");

        let record = self
            .catalog
            .insert(&NewFile {
                name: name.to_string(),
                url: format!("{}/{}/{}", self.public_url, self.bucket, stored.key),
                size: stored.size_bytes,
                object_key: stored.key.clone(),
                created_at,
            })
            .await
            .map_err(|source| {
                warn!(key = %stored.key, "catalog insert failed; stored object is orphaned");
                IngestError::CatalogWrite {
                    key: stored.key.clone(),
                    source,
                }
            })?;
        info!(id = record.id, name = %record.name, "catalogued file");

        if notify {
            let notice = UploadNotice {
                key: stored.key,
                size: stored.size_bytes,
            };
            self.notifier
                .notify(&notice)
                .await
                .map_err(|source| IngestError::Notification {
                    id: record.id,
                    source,
                })?;
        }

        Ok(record.id)
    }
}

/// Object key for an upload: millisecond timestamp plus the display name.
///
/// Two uploads of the same name in the same millisecond map to the same key.
pub fn object_key(timestamp_millis: i64, name: &str) -> String {
    format!("{}_{}", timestamp_millis, name)
}

/// Longest accepted display name in bytes. Leaves room for the timestamp
/// prefix within the object store's key limit.
pub const MAX_NAME_BYTES: usize = 200;

/// Reduce an uploaded filename to its final path component.
///
/// Browsers may send full client paths; only the basename is kept.
fn display_name(raw: &str) -> Result<&str, IngestError> {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        return Err(IngestError::Validation(format!(
            "file name `{}` is not usable",
            raw.escape_debug()
        )));
    }
    if name.len() > MAX_NAME_BYTES {
        return Err(IngestError::Validation(format!(
            "file name is {} bytes; the limit is {}",
            name.len(),
            MAX_NAME_BYTES
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(IngestError::Validation(
            "file name contains control characters".into(),
        ));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_basename_only() {
        assert_eq!(display_name("a.txt").unwrap(), "a.txt");
        assert_eq!(display_name("C:\\Users\\me\\report.pdf").unwrap(), "report.pdf");
        assert_eq!(display_name("/tmp/upload/ photo.png ").unwrap(), "photo.png");
        assert_eq!(display_name("release..notes.txt").unwrap(), "release..notes.txt");
    }

    #[test]
    fn rejects_unusable_names() {
        for raw in ["", "   ", "dir/", "..", "a/.", "bad\u{7}name"] {
            assert!(
                matches!(display_name(raw), Err(IngestError::Validation(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn long_names_are_validation_errors() {
        let longest = "n".repeat(MAX_NAME_BYTES);
        assert!(display_name(&longest).is_ok());
        let key = object_key(i64::MAX, &longest);
        assert!(key.len() <= crate::services::object_store::MAX_OBJECT_KEY_LEN);

        let too_long = format!("{}.txt", "n".repeat(296));
        assert!(matches!(
            display_name(&too_long),
            Err(IngestError::Validation(_))
        ));
    }

    #[test]
    fn key_combines_timestamp_and_name() {
        assert_eq!(object_key(1_700_000_000_123, "a.txt"), "1700000000123_a.txt");
    }
}
