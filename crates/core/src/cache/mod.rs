//! Process-wide, TTL-bounded cache for rendered sitemap output.
//!
//! The cache is best-effort and never a source of truth:
//!
//! - Every operation is infallible from the caller's point of view
//! - Internal failures are reported through `tracing` and behave like a miss
//! - Expired records are evicted lazily, on the next access to their key
//!
//! There is one instance per process ([`TtlCache::global`]). Separate worker
//! processes each own their own cache; they converge within one TTL.

pub mod clock;
pub mod hash;
pub mod ttl;

use std::time::Duration;

pub use clock::{Clock, ManualClock, SystemClock};
pub use hash::content_etag;
pub use ttl::{CacheOutcome, TtlCache};

/// Lifetime of every cache record.
pub const SITEMAP_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Cache key for the rendered sitemap XML.
pub const SITEMAP_XML_KEY: &str = "sitemap:xml";

/// Cache key for the composed sitemap as a JSON entry list.
pub const SITEMAP_JSON_KEY: &str = "sitemap:json";

/// Every key whose content is derived from the composed sitemap.
pub const SITEMAP_KEYS: &[&str] = &[SITEMAP_XML_KEY, SITEMAP_JSON_KEY];
