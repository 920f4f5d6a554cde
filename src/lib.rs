//! Social graph library crate
//!
//! Users, posts, comments, likes and follows behind a pluggable [`Store`],
//! with feed composition and per-viewer enrichment on top.

pub mod api;
pub mod auth;
pub mod config;
pub mod database;
pub mod enrich;
pub mod error;
pub mod feed;
pub mod graph;
pub mod models;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use database::Database;
pub use error::{Error, Result};
pub use feed::FeedEngine;
pub use models::*;
pub use store::{MemoryStore, PgStore, Store};
