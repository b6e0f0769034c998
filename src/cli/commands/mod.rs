//! CLI command implementations

pub mod consolidate;
pub mod ingest;
pub mod init;
pub mod query;
pub mod schemas;
