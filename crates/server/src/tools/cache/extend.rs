//! cache_extend tool implementation.
//!
//! Pushes the expiry of live sitemap renderings one full TTL into the future
//! without recomposing them.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sitekeep_core::cache::SITEMAP_KEYS;
use sitekeep_core::{CacheOutcome, TtlCache};

use crate::tools::json_result;

/// Output from the cache_extend tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheExtendOutput {
    /// Keys whose expiry was extended.
    pub extended: Vec<String>,
    /// Keys with no live record.
    pub absent: Vec<String>,
    pub ttl_secs: u64,
}

/// Implementation of the cache_extend tool.
pub fn extend_impl(cache: &TtlCache) -> Result<CallToolResult, McpError> {
    let (extended, absent): (Vec<&str>, Vec<&str>) =
        SITEMAP_KEYS.iter().copied().partition(|key| cache.refresh(key) == CacheOutcome::Refreshed);

    json_result(&CacheExtendOutput {
        extended: extended.into_iter().map(str::to_string).collect(),
        absent: absent.into_iter().map(str::to_string).collect(),
        ttl_secs: cache.ttl().as_secs(),
    })
}
