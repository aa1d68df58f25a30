//! sitemap_refresh tool implementation.
//!
//! Regenerates the static sitemap and waits for the run to finish.

use std::time::Instant;

use chrono::Utc;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sitekeep_core::SitemapRefresher;

use crate::tools::json_result;

/// Output from the sitemap_refresh tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SitemapRefreshOutput {
    pub refreshed: bool,
    /// ISO8601 timestamp of when the run finished.
    pub refreshed_at: String,
    pub elapsed_ms: u64,
}

/// Implementation of the sitemap_refresh tool.
pub async fn refresh_impl(refresher: &SitemapRefresher) -> Result<CallToolResult, McpError> {
    let started = Instant::now();
    refresher.refresh().await?;

    json_result(&SitemapRefreshOutput {
        refreshed: true,
        refreshed_at: Utc::now().to_rfc3339(),
        elapsed_ms: started.elapsed().as_millis() as u64,
    })
}
