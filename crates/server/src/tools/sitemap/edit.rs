//! sitemap_edit_url tool implementation.
//!
//! Edits one record of the static sitemap file in place.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sitekeep_core::SitemapComposer;
use sitekeep_core::sitemap::{ChangeFreq, UrlEdit, UrlSummary};

use crate::tools::json_result;

/// Parameters for the sitemap_edit_url tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SitemapEditUrlParams {
    /// The `loc` of the static record to edit.
    pub loc: String,

    /// New change frequency.
    #[serde(default)]
    pub changefreq: Option<ChangeFreq>,

    /// New priority, 0.0 to 1.0.
    #[serde(default)]
    pub priority: Option<f64>,
}

/// Output from the sitemap_edit_url tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SitemapEditUrlOutput {
    /// The record as written.
    pub url: UrlSummary,
}

/// Implementation of the sitemap_edit_url tool.
pub async fn edit_impl(composer: &SitemapComposer, params: SitemapEditUrlParams) -> Result<CallToolResult, McpError> {
    let edit = UrlEdit { loc: params.loc, changefreq: params.changefreq, priority: params.priority };
    let record = composer.apply_edit(&edit).await?;
    json_result(&SitemapEditUrlOutput { url: UrlSummary::from(&record) })
}
