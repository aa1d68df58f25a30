//! Core types and shared functionality for sitekeep.
//!
//! This crate provides:
//! - In-memory TTL cache for rendered sitemap output
//! - SQLite store for custom sitemap entries
//! - Sitemap codec, composer and refresh orchestration
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod sitemap;
pub mod store;

pub use cache::{CacheOutcome, TtlCache};
pub use error::Error;
pub use sitemap::{SitemapComposer, SitemapDocument, SitemapRefresher, UrlRecord};
pub use store::{SitemapDb, SitemapEntry};
