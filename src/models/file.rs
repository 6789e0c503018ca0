//! Catalog rows describing uploaded files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Catalog identifier, assigned by the database on insert.
pub type FileId = i64;

/// A row of the `files` table.
///
/// The catalog never holds file content; `object_key` and `url` point at the
/// object store.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
pub struct FileRecord {
    /// Auto-increment identifier.
    pub id: FileId,

    /// When the row was inserted.
    pub created_at: DateTime<Utc>,

    /// Display name (the uploaded file's basename).
    pub name: String,

    /// Canonical retrieval URL.
    pub url: String,

    /// Size in bytes of the stored object.
    pub size: i64,

    /// Key of the stored object in the configured bucket.
    pub object_key: String,
}

/// Values for a new catalog row.
#[derive(Clone, Debug)]
pub struct NewFile {
    pub name: String,
    pub url: String,
    pub size: i64,
    pub object_key: String,
    pub created_at: DateTime<Utc>,
}

/// A catalog row plus the per-session `seen` flag computed at read time.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct AnnotatedFile {
    #[serde(flatten)]
    pub file: FileRecord,
    pub seen: bool,
}
