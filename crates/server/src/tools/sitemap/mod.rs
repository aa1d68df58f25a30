//! Sitemap MCP tools.
//!
//! Reads go through the cache; writes go through the composer or the
//! refresher, which invalidate it.

pub mod edit;
pub mod entries;
pub mod get;
pub mod refresh;

pub use edit::{SitemapEditUrlParams, edit_impl};
pub use entries::{
    SitemapDeleteEntryParams, SitemapEntriesParams, SitemapEntryParams, SitemapUpdateEntryParams, activate_impl,
    add_impl, delete_impl, list_impl, update_impl,
};
pub use get::{SitemapGetParams, get_impl};
pub use refresh::refresh_impl;
