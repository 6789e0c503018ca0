//! Application state shared across all handlers.

use crate::{
    config::AppConfig,
    services::{
        catalog::Catalog,
        ingest::IngestPipeline,
        notifier::{LogNotifier, Notifier, SmtpNotifier},
        object_store::{LocalObjectStore, ObjectStore},
        reader::CatalogReader,
        seen::{MemorySessionStore, RedisSessionStore, SeenTracker, SessionStore},
    },
};
use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

const MAX_MEMORY_SESSIONS: u64 = 100_000;

/// Every external client the service talks to, built once at startup.
///
/// Handlers receive it through `State<AppState>`; nothing is reachable
/// through globals. Cloning is cheap.
#[derive(Clone, Debug)]
pub struct AppState {
    pub pipeline: Arc<IngestPipeline>,
    pub reader: Arc<CatalogReader>,
    pub seen: Arc<SeenTracker>,
    pub objects: Arc<dyn ObjectStore>,
    pub catalog: Catalog,
}

impl AppState {
    /// Wire the services around already-constructed backends.
    pub fn new(
        catalog: Catalog,
        objects: Arc<dyn ObjectStore>,
        notifier: Arc<dyn Notifier>,
        sessions: Arc<dyn SessionStore>,
        cfg: &AppConfig,
    ) -> Self {
        let pipeline = IngestPipeline::new(
            objects.clone(),
            catalog.clone(),
            notifier,
            cfg.bucket.clone(),
            cfg.public_url.clone(),
        );
        Self {
            pipeline: Arc::new(pipeline),
            reader: Arc::new(CatalogReader::new(catalog.clone())),
            seen: Arc::new(SeenTracker::new(sessions, cfg.seen_capacity)),
            objects,
            catalog,
        }
    }

    /// Build the backends selected by configuration, then wire them.
    ///
    /// The catalog schema is applied here, so every run mode starts against
    /// an up-to-date database.
    pub async fn from_config(cfg: &AppConfig, db: Arc<SqlitePool>) -> Result<Self> {
        let catalog = Catalog::new(db);
        let statements = catalog
            .migrate()
            .await
            .context("applying catalog schema")?;
        info!("Catalog schema ready ({} statements)", statements);

        let store = LocalObjectStore::new(cfg.storage_dir.clone());
        store
            .ensure_bucket(&cfg.bucket)
            .await
            .with_context(|| format!("preparing bucket `{}`", cfg.bucket))?;

        let notifier: Arc<dyn Notifier> = match &cfg.smtp_host {
            Some(host) => {
                info!("Sending notifications through {}:{}", host, cfg.smtp_port);
                Arc::new(
                    SmtpNotifier::new(host, cfg.smtp_port, &cfg.mail_from, &cfg.mail_to)
                        .context("configuring smtp notifier")?,
                )
            }
            None => Arc::new(LogNotifier),
        };

        let sessions: Arc<dyn SessionStore> = match &cfg.redis_url {
            Some(url) => Arc::new(
                RedisSessionStore::connect(url, cfg.session_ttl)
                    .await
                    .context("connecting to redis")?,
            ),
            None => Arc::new(MemorySessionStore::new(cfg.session_ttl, MAX_MEMORY_SESSIONS)),
        };
        info!("Session backend: {}", sessions.backend());

        Ok(Self::new(
            catalog,
            Arc::new(store),
            notifier,
            sessions,
            cfg,
        ))
    }
}
