//! Minimal file-hosting service.
//!
//! Uploads are written to an object store, recorded in a SQLite catalog and
//! announced by email; each browser session remembers which files it has
//! opened.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
