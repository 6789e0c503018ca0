//! Represents an object (blob) held by the object store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single stored object, addressed by bucket + key.
///
/// The object store is the sole owner of the bytes; this struct only carries
/// what the store reports back about them.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    /// Bucket the object lives in.
    pub bucket: String,

    /// Object key within the bucket.
    pub key: String,

    /// Size in bytes, as written.
    pub size_bytes: i64,

    /// Hex MD5 of the content, when the store knows it.
    pub etag: Option<String>,

    /// Timestamp when the object was last written.
    pub last_modified: DateTime<Utc>,
}
