//! cache_clear tool implementation.
//!
//! Drops every cached rendering so the next read recomposes.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sitekeep_core::{CacheOutcome, TtlCache};

use crate::tools::json_result;

/// Output from the cache_clear tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheClearOutput {
    /// Number of records removed, expired ones included.
    pub cleared: usize,
}

/// Implementation of the cache_clear tool.
pub fn clear_impl(cache: &TtlCache) -> Result<CallToolResult, McpError> {
    let cleared = match cache.clear() {
        CacheOutcome::Cleared(n) => n,
        _ => 0,
    };
    tracing::info!(cleared, "cleared sitemap cache");
    json_result(&CacheClearOutput { cleared })
}
