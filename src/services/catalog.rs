//! Catalog store: the `files` table in SQLite.
//!
//! Rows are only ever appended by the ingestion pipeline and read by the
//! listing and detail views. Content never lives here, only the key and URL
//! of the stored object.

use crate::models::file::{FileId, FileRecord, NewFile};
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("file {0} not found")]
    NotFound(FileId),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Clone, Debug)]
pub struct Catalog {
    /// Shared SQLite connection pool.
    db: Arc<SqlitePool>,
}

impl Catalog {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// Apply the embedded schema. Safe to run repeatedly.
    pub async fn migrate(&self) -> CatalogResult<usize> {
        let statements = SCHEMA
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        for stmt in &statements {
            debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(statements.len())
    }

    /// Insert a row and return it with its generated id.
    pub async fn insert(&self, file: &NewFile) -> CatalogResult<FileRecord> {
        let record = sqlx::query_as::<_, FileRecord>(
            "INSERT INTO files (created_at, name, url, size, object_key)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id, created_at, name, url, size, object_key",
        )
        .bind(file.created_at)
        .bind(&file.name)
        .bind(&file.url)
        .bind(file.size)
        .bind(&file.object_key)
        .fetch_one(&*self.db)
        .await?;
        Ok(record)
    }

    /// Most recently created rows, newest first. Rows sharing a timestamp
    /// fall back to id order so the result is stable.
    pub async fn recent(&self, limit: u32) -> CatalogResult<Vec<FileRecord>> {
        let rows = sqlx::query_as::<_, FileRecord>(
            "SELECT id, created_at, name, url, size, object_key
             FROM files
             ORDER BY created_at DESC, id DESC
             LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    pub async fn get(&self, id: FileId) -> CatalogResult<FileRecord> {
        sqlx::query_as::<_, FileRecord>(
            "SELECT id, created_at, name, url, size, object_key FROM files WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => CatalogError::NotFound(id),
            other => CatalogError::Sqlx(other),
        })
    }

    pub async fn count(&self) -> CatalogResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM files")
            .fetch_one(&*self.db)
            .await?;
        Ok(count)
    }
}
