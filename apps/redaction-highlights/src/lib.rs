//! Redaction Highlights
//!
//! Highlight storage and coordination for a PDF redaction workflow.
//!
//! # Modules
//!
//! - `highlights`: the highlight record, its index and the store façade
//! - `db`: durable backends (SQLite, in-memory)
//! - `events`: change subscriptions and the typed event bus
//! - `sync`: index/backend reconciliation and file lifecycle handling
//! - `routes`: the HTTP API

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod highlights;
pub mod routes;
pub mod state;
pub mod sync;
