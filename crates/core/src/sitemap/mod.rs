//! Sitemap document handling.
//!
//! - [`model`]: the in-memory document and its field types
//! - [`codec`]: XML decode/encode that keeps unknown markup
//! - [`file`]: the static sitemap on disk
//! - [`composer`]: merge with custom entries, cached rendering, edits
//! - [`refresh`]: out-of-process regeneration

pub mod codec;
pub mod composer;
pub mod file;
pub mod model;
pub mod refresh;

pub use composer::{RenderFormat, RenderedSitemap, SitemapComposer, UrlEdit, merge};
pub use file::StaticSitemapFile;
pub use model::{ChangeFreq, Priority, SitemapDocument, UrlField, UrlRecord, UrlSummary, XmlElement};
pub use refresh::{CommandRegenerator, RegenerationOutput, Regenerator, SitemapRefresher};
