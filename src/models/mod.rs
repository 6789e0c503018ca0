//! Core data models for the file-hosting service.
//!
//! `file` holds catalog rows (mapped with `sqlx::FromRow`); `object` holds
//! what the object store reports about stored blobs.

pub mod file;
pub mod object;
