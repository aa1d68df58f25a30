//! mcp-sitemap server entry point.
//!
//! This is the main binary that boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use sitekeep_core::config::AppConfig;
use sitekeep_core::sitemap::StaticSitemapFile;
use sitekeep_core::{SitemapComposer, SitemapDb, SitemapRefresher, TtlCache};
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    tracing::info!(
        db_path = %config.db_path.display(),
        sitemap_path = %config.sitemap_path.display(),
        regenerate_program = %config.regenerate_program,
        "Starting mcp-sitemap server on stdio transport"
    );

    let db = SitemapDb::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open {}", config.db_path.display()))?;
    let cache = TtlCache::global();
    let file = Arc::new(StaticSitemapFile::new(&config.sitemap_path));

    let composer = Arc::new(SitemapComposer::new(db, file.clone(), cache.clone()));
    let refresher = Arc::new(SitemapRefresher::new(Arc::new(config.regenerator()), file, cache));

    let handler = handler::SitemapServer::new(composer, refresher);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
