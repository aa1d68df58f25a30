//! sitemap_get tool implementation.
//!
//! Serves the composed sitemap, from the cache when it is still live.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sitekeep_core::SitemapComposer;
use sitekeep_core::sitemap::{RenderFormat, RenderedSitemap};

use crate::tools::json_result;

/// Parameters for the sitemap_get tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SitemapGetParams {
    /// Output format: "xml" (default) or "json".
    #[serde(default)]
    pub format: RenderFormat,
}

/// Implementation of the sitemap_get tool.
pub async fn get_impl(composer: &SitemapComposer, params: SitemapGetParams) -> Result<CallToolResult, McpError> {
    let rendered: RenderedSitemap = composer.render(params.format).await?;
    json_result(&rendered)
}
