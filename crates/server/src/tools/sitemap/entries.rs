//! Custom entry tools: sitemap_entries, sitemap_add_entry,
//! sitemap_update_entry, sitemap_activate_entry and sitemap_delete_entry.
//!
//! Every write goes through the composer so cached renderings are dropped.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sitekeep_core::sitemap::ChangeFreq;
use sitekeep_core::store::{EntryUpdate, NewSitemapEntry};
use sitekeep_core::{SitemapComposer, SitemapEntry};

use crate::tools::json_result;

/// Parameters for the sitemap_entries tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SitemapEntriesParams {
    /// Only list entries flagged as custom.
    #[serde(default)]
    pub custom_only: bool,
}

/// Output from the sitemap_entries tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SitemapEntriesOutput {
    pub count: usize,
    pub entries: Vec<SitemapEntry>,
}

/// Parameters shared by sitemap_add_entry and sitemap_activate_entry.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SitemapEntryParams {
    /// URL of the page (matched exactly against static `<loc>` values).
    pub url: String,

    /// Change frequency (default: "weekly").
    #[serde(default)]
    pub changefreq: Option<ChangeFreq>,

    /// Priority, 0.0 to 1.0 (default: 0.5).
    #[serde(default)]
    pub priority: Option<f64>,

    /// Last modification date, W3C date or RFC 3339 date-time.
    #[serde(default)]
    pub lastmod: Option<String>,

    /// Optional human-readable title.
    #[serde(default)]
    pub title: Option<String>,
}

impl From<SitemapEntryParams> for NewSitemapEntry {
    fn from(params: SitemapEntryParams) -> Self {
        let mut entry = NewSitemapEntry::custom(params.url);
        if let Some(changefreq) = params.changefreq {
            entry = entry.with_changefreq(changefreq);
        }
        if let Some(priority) = params.priority {
            entry = entry.with_priority(priority);
        }
        entry.lastmod = params.lastmod;
        entry.title = params.title;
        entry
    }
}

/// Parameters for the sitemap_update_entry tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SitemapUpdateEntryParams {
    /// URL of the stored entry.
    pub url: String,

    #[serde(default)]
    pub changefreq: Option<ChangeFreq>,

    #[serde(default)]
    pub priority: Option<f64>,

    #[serde(default)]
    pub lastmod: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    /// Include or exclude the entry from the served sitemap.
    #[serde(default)]
    pub is_custom: Option<bool>,
}

/// Parameters for the sitemap_delete_entry tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SitemapDeleteEntryParams {
    /// URL of the stored entry.
    pub url: String,
}

/// Output from the single-entry write tools.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SitemapEntryOutput {
    pub entry: SitemapEntry,
}

/// Output from the sitemap_delete_entry tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SitemapDeleteEntryOutput {
    pub url: String,
    pub deleted: bool,
}

/// Implementation of the sitemap_entries tool.
pub async fn list_impl(composer: &SitemapComposer, params: SitemapEntriesParams) -> Result<CallToolResult, McpError> {
    let entries = composer.list_entries(params.custom_only).await?;
    json_result(&SitemapEntriesOutput { count: entries.len(), entries })
}

/// Implementation of the sitemap_add_entry tool.
pub async fn add_impl(composer: &SitemapComposer, params: SitemapEntryParams) -> Result<CallToolResult, McpError> {
    let entry = composer.add_custom_entry(&params.into()).await?;
    json_result(&SitemapEntryOutput { entry })
}

/// Implementation of the sitemap_activate_entry tool.
pub async fn activate_impl(
    composer: &SitemapComposer, params: SitemapEntryParams,
) -> Result<CallToolResult, McpError> {
    let entry = composer.activate_entry(&params.into()).await?;
    json_result(&SitemapEntryOutput { entry })
}

/// Implementation of the sitemap_update_entry tool.
pub async fn update_impl(
    composer: &SitemapComposer, params: SitemapUpdateEntryParams,
) -> Result<CallToolResult, McpError> {
    let update = EntryUpdate {
        changefreq: params.changefreq,
        priority: params.priority,
        lastmod: params.lastmod,
        title: params.title,
        is_custom: params.is_custom,
    };
    let entry = composer.update_entry(&params.url, &update).await?;
    json_result(&SitemapEntryOutput { entry })
}

/// Implementation of the sitemap_delete_entry tool.
pub async fn delete_impl(
    composer: &SitemapComposer, params: SitemapDeleteEntryParams,
) -> Result<CallToolResult, McpError> {
    composer.delete_entry(&params.url).await?;
    json_result(&SitemapDeleteEntryOutput { url: params.url, deleted: true })
}
