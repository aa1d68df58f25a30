//! Cache-related MCP tools.
//!
//! This module provides tools for managing the in-memory sitemap cache.

pub mod clear;
pub mod extend;

pub use clear::clear_impl;
pub use extend::extend_impl;
