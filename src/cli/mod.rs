//! `coin-ingest` command-line interface
//!
//! The binary resolves [`IngestConfig`](crate::config::IngestConfig) into
//! concrete stores and hands them to the library; nothing below `cli`
//! reads files or the environment on its own.

pub mod backends;
pub mod commands;
pub mod error;
