//! SQLite-backed store for sitemap entries.
//!
//! This module persists admin-authored URL entries using SQLite with async
//! access via tokio-rusqlite. It supports:
//!
//! - One row per URL, enforced by a unique index
//! - Fast filtering of custom entries via an `is_custom` index
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod migrations;

pub use crate::Error;

pub use connection::SitemapDb;
pub use entries::{EntryUpdate, NewSitemapEntry, SitemapEntry};
