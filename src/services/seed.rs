//! One-time bootstrap: apply the catalog schema and ingest example files.

use crate::services::{catalog::Catalog, ingest::IngestPipeline};
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs::{self, File};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

/// Migrate the catalog, then ingest every regular file in `dir` (sorted by
/// name) without sending notifications. Returns the number of files ingested.
pub async fn seed_catalog(catalog: &Catalog, pipeline: &IngestPipeline, dir: &Path) -> Result<usize> {
    let statements = catalog.migrate().await.context("migrating catalog")?;
    info!("Applied {} schema statements", statements);

    let mut entries = fs::read_dir(dir)
        .await
        .with_context(|| format!("reading seed directory {}", dir.display()))?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();

    for path in &paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("seed path {} has no file name", path.display()))?;
        let file = File::open(path)
            .await
            .with_context(|| format!("opening {}", path.display()))?;
        let size = file.metadata().await?.len();

        debug!("inserting file: {}", name);
        let id = pipeline
            .ingest(&name, Box::pin(ReaderStream::new(file)), Some(size), false)
            .await
            .with_context(|| format!("ingesting seed file {}", name))?;
        info!(id, name = %name, size, "seeded file");
    }

    Ok(paths.len())
}
