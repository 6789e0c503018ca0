//! Read side: catalog rows annotated with a session's seen-set.

use crate::{
    models::file::{AnnotatedFile, FileId, FileRecord},
    services::{
        catalog::{Catalog, CatalogResult},
        seen::SeenFiles,
    },
};

/// Number of files on the front page listing.
pub const RECENT_LIMIT: u32 = 5;

#[derive(Clone, Debug)]
pub struct CatalogReader {
    catalog: Catalog,
}

impl CatalogReader {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    /// Newest `limit` files, each flagged with whether `seen` contains it.
    pub async fn list_recent(
        &self,
        limit: u32,
        seen: &SeenFiles,
    ) -> CatalogResult<Vec<AnnotatedFile>> {
        let files = self.catalog.recent(limit).await?;
        Ok(files.into_iter().map(|file| annotate(file, seen)).collect())
    }

    /// A single file, or `CatalogError::NotFound`. `seen` reflects the
    /// session's state before this view; recording the view is the caller's
    /// job.
    pub async fn get_detail(&self, id: FileId, seen: &SeenFiles) -> CatalogResult<AnnotatedFile> {
        let file = self.catalog.get(id).await?;
        Ok(annotate(file, seen))
    }
}

fn annotate(file: FileRecord, seen: &SeenFiles) -> AnnotatedFile {
    let seen = seen.contains(file.id);
    AnnotatedFile { file, seen }
}
