//! Defines the HTTP surface.
//!
//! - `GET  /`                        -> recent files, annotated for this session
//! - `GET  /detail/{id}`             -> one file; marks it as seen
//! - `POST /upload`                  -> multipart upload (field `file`)
//! - `GET  /objects/{bucket}/{key}`  -> stream a stored object
//! - `GET  /healthz`, `GET /readyz`  -> probes

use crate::{
    handlers::{
        file_handlers::{file_detail, list_recent, upload_file},
        health_handlers::{healthz, readyz},
        object_handlers::get_object,
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Build the router. Upload bodies may be up to `max_upload_bytes`.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/", get(list_recent))
        .route("/detail/{id}", get(file_detail))
        .route(
            "/upload",
            post(upload_file).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/objects/{bucket}/{key}", get(get_object))
        .layer(TraceLayer::new_for_http())
}
