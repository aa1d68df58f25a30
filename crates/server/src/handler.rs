//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::{
    cache::{clear_impl, extend_impl},
    sitemap::{
        SitemapDeleteEntryParams, SitemapEditUrlParams, SitemapEntriesParams, SitemapEntryParams, SitemapGetParams,
        SitemapUpdateEntryParams, activate_impl, add_impl, delete_impl, edit_impl, get_impl, list_impl, refresh_impl,
        update_impl,
    },
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use sitekeep_core::{SitemapComposer, SitemapRefresher};

/// The main MCP server handler for mcp-sitemap.
#[derive(Clone)]
pub struct SitemapServer {
    tool_router: ToolRouter<Self>,
    composer: Arc<SitemapComposer>,
    refresher: Arc<SitemapRefresher>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl SitemapServer {
    /// Create a new server handler.
    pub fn new(composer: Arc<SitemapComposer>, refresher: Arc<SitemapRefresher>) -> Self {
        Self { tool_router: Self::tool_router(), composer, refresher }
    }

    #[tool(description = "Get the served sitemap: the static sitemap merged with custom entries. \
        Cached for one hour; returns XML (default) or a JSON list of URLs with an etag.")]
    async fn sitemap_get(&self, params: Parameters<SitemapGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.composer, params.0).await
    }

    #[tool(description = "List stored sitemap entries in insertion order. Set custom_only to list only served ones.")]
    async fn sitemap_entries(&self, params: Parameters<SitemapEntriesParams>) -> Result<CallToolResult, McpError> {
        list_impl(&self.composer, params.0).await
    }

    #[tool(description = "Add a custom sitemap entry. Fails if the URL is already stored.")]
    async fn sitemap_add_entry(&self, params: Parameters<SitemapEntryParams>) -> Result<CallToolResult, McpError> {
        add_impl(&self.composer, params.0).await
    }

    #[tool(description = "Update fields of a stored sitemap entry. Omitted fields are left unchanged.")]
    async fn sitemap_update_entry(
        &self, params: Parameters<SitemapUpdateEntryParams>,
    ) -> Result<CallToolResult, McpError> {
        update_impl(&self.composer, params.0).await
    }

    #[tool(description = "Create a custom sitemap entry, or mark an existing stored entry as custom.")]
    async fn sitemap_activate_entry(&self, params: Parameters<SitemapEntryParams>) -> Result<CallToolResult, McpError> {
        activate_impl(&self.composer, params.0).await
    }

    #[tool(description = "Delete a stored sitemap entry.")]
    async fn sitemap_delete_entry(
        &self, params: Parameters<SitemapDeleteEntryParams>,
    ) -> Result<CallToolResult, McpError> {
        delete_impl(&self.composer, params.0).await
    }

    /// Edit a URL of the generated static sitemap in place.
    ///
    /// Sets lastmod to the current time and rewrites the file.
    #[tool(description = "Edit changefreq and/or priority of a URL in the static sitemap file. \
        Sets lastmod to now. Fails with NOT_FOUND if the URL is not in the static sitemap.")]
    async fn sitemap_edit_url(&self, params: Parameters<SitemapEditUrlParams>) -> Result<CallToolResult, McpError> {
        edit_impl(&self.composer, params.0).await
    }

    #[tool(description = "Regenerate the static sitemap with the configured generator and wait for it to finish. \
        The cache is only invalidated when the run succeeds.")]
    async fn sitemap_refresh(&self) -> Result<CallToolResult, McpError> {
        refresh_impl(&self.refresher).await
    }

    #[tool(description = "Remove every cached sitemap rendering.")]
    async fn cache_clear(&self) -> Result<CallToolResult, McpError> {
        clear_impl(self.composer.cache())
    }

    #[tool(description = "Extend the expiry of cached sitemap renderings by one TTL without recomposing them.")]
    async fn cache_extend(&self) -> Result<CallToolResult, McpError> {
        extend_impl(self.composer.cache())
    }
}

impl ServerHandler for SitemapServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "mcp-sitemap".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
