//! Graph page ingestion library.
//!
//! Walks a page's posts, comments, replies and reaction counts on the Graph API
//! and stores them incrementally in SQLite, so that re-runs pick up where the
//! previous run stopped instead of re-fetching or duplicating data.

pub mod config;
pub mod constants;
pub mod db;
pub mod graph;
pub mod ingest;
