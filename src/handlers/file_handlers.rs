//! HTTP handlers for the file listing, detail view and upload.
//!
//! Upload bodies are streamed straight into the ingestion pipeline; nothing
//! is buffered in memory.

use crate::{
    errors::AppError,
    handlers::session::session_from,
    models::file::{AnnotatedFile, FileId},
    services::reader::RECENT_LIMIT,
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, Path, State},
    response::Redirect,
};
use axum_extra::extract::cookie::CookieJar;
use futures::StreamExt;
use serde::Serialize;
use std::io;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct RecentFiles {
    pub latest_files: Vec<AnnotatedFile>,
}

/// `GET /`: newest files, flagged with what this session has already viewed.
pub async fn list_recent(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<RecentFiles>), AppError> {
    let (jar, session) = session_from(jar);
    let seen = state.seen.get_seen(&session).await?;
    let latest_files = state.reader.list_recent(RECENT_LIMIT, &seen).await?;
    Ok((jar, Json(RecentFiles { latest_files })))
}

/// `GET /detail/{id}`: one file; viewing it marks it as seen.
pub async fn file_detail(
    State(state): State<AppState>,
    Path(id): Path<FileId>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<AnnotatedFile>), AppError> {
    info!("viewing file: {}", id);
    let (jar, session) = session_from(jar);
    let mut seen = state.seen.get_seen(&session).await?;
    let file = state.reader.get_detail(id, &seen).await?;
    state.seen.record_view(&session, &mut seen, file.file.id).await?;
    Ok((jar, Json(file)))
}

/// `POST /upload`: multipart field `file`; redirects to the new detail page.
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Redirect, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let name = field
            .file_name()
            .map(str::to_owned)
            .ok_or_else(|| AppError::bad_request("field `file` carries no file name"))?;
        info!("uploading file: {}", name);

        let content = field.map(|chunk| chunk.map_err(io::Error::other));
        let id = state
            .pipeline
            .ingest(&name, Box::pin(content), None, true)
            .await?;
        return Ok(Redirect::to(&format!("/detail/{}", id)));
    }

    Err(AppError::bad_request("missing multipart field `file`"))
}
