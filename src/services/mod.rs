//! Service layer: storage, catalog, notification and session tracking, plus
//! the ingestion pipeline and read side composed from them.

pub mod catalog;
pub mod ingest;
pub mod notifier;
pub mod object_store;
pub mod reader;
pub mod seed;
pub mod seen;
