//! Merges the static sitemap with stored custom entries and applies edits.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::SecondsFormat;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::codec;
use super::file::StaticSitemapFile;
use super::model::{ChangeFreq, Priority, SitemapDocument, UrlRecord, UrlSummary};
use crate::Error;
use crate::cache::{Clock, SITEMAP_JSON_KEY, SITEMAP_KEYS, SITEMAP_XML_KEY, SystemClock, TtlCache, content_etag};
use crate::store::{EntryUpdate, NewSitemapEntry, SitemapDb, SitemapEntry};

/// Output formats served from the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RenderFormat {
    #[default]
    Xml,
    Json,
}

impl RenderFormat {
    fn cache_key(self) -> &'static str {
        match self {
            RenderFormat::Xml => SITEMAP_XML_KEY,
            RenderFormat::Json => SITEMAP_JSON_KEY,
        }
    }
}

/// A rendered sitemap and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RenderedSitemap {
    pub format: RenderFormat,
    pub content: String,
    /// SHA-256 of `content`.
    pub etag: String,
    /// Whether the content was served from the cache.
    pub cached: bool,
}

/// An edit to one record of the static sitemap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UrlEdit {
    pub loc: String,
    #[serde(default)]
    pub changefreq: Option<ChangeFreq>,
    #[serde(default)]
    pub priority: Option<f64>,
}

/// Builds the served sitemap and routes admin writes.
pub struct SitemapComposer {
    db: SitemapDb,
    file: Arc<StaticSitemapFile>,
    cache: Arc<TtlCache>,
    clock: Arc<dyn Clock>,
}

impl SitemapComposer {
    pub fn new(db: SitemapDb, file: Arc<StaticSitemapFile>, cache: Arc<TtlCache>) -> Self {
        Self { db, file, cache, clock: Arc::new(SystemClock) }
    }

    /// Use `clock` for edit timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn db(&self) -> &SitemapDb {
        &self.db
    }

    pub fn cache(&self) -> &Arc<TtlCache> {
        &self.cache
    }

    /// Decode the static sitemap and merge custom entries into it.
    pub async fn compose(&self) -> Result<SitemapDocument, Error> {
        let raw = self.file.read().await?;
        let static_doc = codec::decode(&raw)?;
        let custom = self.db.list_custom_entries().await?;
        Ok(merge(static_doc, &custom))
    }

    /// Serve the composed sitemap, from the cache when possible.
    ///
    /// A rendering composed while a write invalidated the cache is returned
    /// but not stored.
    pub async fn render(&self, format: RenderFormat) -> Result<RenderedSitemap, Error> {
        let key = format.cache_key();
        if let Some(content) = self.cache.get(key) {
            tracing::debug!(key, "sitemap cache hit");
            let etag = content_etag(&content);
            return Ok(RenderedSitemap { format, content, etag, cached: true });
        }

        tracing::debug!(key, "sitemap cache miss; composing");
        let generation = self.cache.generation();
        let doc = self.compose().await?;
        let content = match format {
            RenderFormat::Xml => codec::encode(&doc)?,
            RenderFormat::Json => {
                let summaries: Vec<UrlSummary> = doc.urls.iter().map(UrlSummary::from).collect();
                serde_json::to_string_pretty(&summaries)
                    .map_err(|e| Error::Io(format!("failed to serialize sitemap: {e}")))?
            }
        };
        self.cache.set_if_generation(key, content.as_str(), generation);

        let etag = content_etag(&content);
        Ok(RenderedSitemap { format, content, etag, cached: false })
    }

    /// Rewrite one record of the static sitemap in place.
    ///
    /// Sets `lastmod` to now and normalises `priority`. Custom entries are
    /// edited through the store instead.
    ///
    /// # Errors
    ///
    /// `Error::NotFound` if no static record has `edit.loc`; the file is left
    /// untouched in that case.
    pub async fn apply_edit(&self, edit: &UrlEdit) -> Result<UrlRecord, Error> {
        let loc = edit.loc.trim();
        let new_priority = edit.priority.map(Priority::new).transpose()?;

        let _guard = self.file.lock().await;
        let raw = self.file.read().await?;
        let mut doc = codec::decode(&raw)?;

        let record = doc
            .find_mut(loc)
            .ok_or_else(|| Error::NotFound(format!("no static sitemap entry for {loc}")))?;

        if let Some(changefreq) = edit.changefreq {
            record.set_changefreq(changefreq);
        }
        let priority = new_priority.or_else(|| record.priority().and_then(|p| Priority::new(p.value()).ok()));
        if let Some(priority) = priority {
            record.set_priority(priority);
        }
        record.set_lastmod(self.clock.now().to_rfc3339_opts(SecondsFormat::Secs, true));
        let updated = record.clone();

        self.file.write(&codec::encode(&doc)?).await?;
        self.invalidate();

        tracing::info!(loc, "applied edit to static sitemap");
        Ok(updated)
    }

    /// Store a new custom entry.
    pub async fn add_custom_entry(&self, entry: &NewSitemapEntry) -> Result<SitemapEntry, Error> {
        let mut entry = entry.clone();
        entry.is_custom = true;
        let stored = self.db.insert_entry(&entry).await?;
        self.invalidate();
        tracing::info!(url = %stored.url, "added custom sitemap entry");
        Ok(stored)
    }

    /// Store `entry` as custom, creating or promoting it.
    pub async fn activate_entry(&self, entry: &NewSitemapEntry) -> Result<SitemapEntry, Error> {
        let stored = self.db.activate_entry(entry).await?;
        self.invalidate();
        tracing::info!(url = %stored.url, "activated custom sitemap entry");
        Ok(stored)
    }

    pub async fn update_entry(&self, url: &str, update: &EntryUpdate) -> Result<SitemapEntry, Error> {
        let stored = self.db.update_entry(url, update).await?;
        self.invalidate();
        Ok(stored)
    }

    /// Delete a stored entry.
    ///
    /// # Errors
    ///
    /// `Error::NotFound` if nothing is stored under `url`.
    pub async fn delete_entry(&self, url: &str) -> Result<(), Error> {
        if !self.db.delete_entry(url).await? {
            return Err(Error::NotFound(format!("no sitemap entry for {}", url.trim())));
        }
        self.invalidate();
        tracing::info!(url = url.trim(), "deleted sitemap entry");
        Ok(())
    }

    pub async fn list_entries(&self, custom_only: bool) -> Result<Vec<SitemapEntry>, Error> {
        if custom_only { self.db.list_custom_entries().await } else { self.db.list_entries().await }
    }

    /// Drop every cached rendering of the sitemap.
    pub fn invalidate(&self) {
        self.cache.invalidate(SITEMAP_KEYS);
    }
}

/// Merge custom entries into a static document.
///
/// Static order is kept and duplicate static `loc`s collapse to their first
/// occurrence. Custom entries are appended in the order given; a custom entry
/// whose URL already appears in the static document replaces that record in
/// place.
pub fn merge(static_doc: SitemapDocument, custom: &[SitemapEntry]) -> SitemapDocument {
    let mut doc = static_doc;

    let mut seen = HashSet::new();
    doc.urls.retain(|url| {
        let first = seen.insert(url.loc().to_string());
        if !first {
            tracing::warn!(loc = url.loc(), "dropping duplicate loc from static sitemap");
        }
        first
    });

    let mut positions: HashMap<String, usize> =
        doc.urls.iter().enumerate().map(|(i, u)| (u.loc().to_string(), i)).collect();

    for entry in custom {
        let record = record_from_entry(entry);
        match positions.get(&entry.url) {
            Some(&i) => {
                tracing::warn!(url = %entry.url, "custom entry overrides static sitemap entry");
                doc.urls[i] = record;
            }
            None => {
                positions.insert(entry.url.clone(), doc.urls.len());
                doc.urls.push(record);
            }
        }
    }

    doc
}

fn record_from_entry(entry: &SitemapEntry) -> UrlRecord {
    UrlRecord::new(entry.url.as_str())
        .with_lastmod(entry.lastmod.as_deref().unwrap_or(&entry.updated_at))
        .with_changefreq(entry.changefreq)
        .with_priority(Priority::clamped(entry.priority))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ManualClock, SITEMAP_CACHE_TTL};
    use chrono::{TimeZone, Utc};

    const STATIC_SITEMAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url>
    <loc>/</loc>
    <lastmod>2024-01-01T00:00:00Z</lastmod>
    <changefreq>daily</changefreq>
    <priority>1.0</priority>
  </url>
  <url>
    <loc>/about</loc>
    <lastmod>2024-01-01T00:00:00Z</lastmod>
    <changefreq>weekly</changefreq>
    <priority>0.7</priority>
  </url>
</urlset>
"#;

    struct Fixture {
        _dir: tempfile::TempDir,
        file: Arc<StaticSitemapFile>,
        clock: Arc<ManualClock>,
        composer: SitemapComposer,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let file = Arc::new(StaticSitemapFile::new(dir.path().join("sitemap.xml")));
        file.write(STATIC_SITEMAP).await.unwrap();

        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()));
        let cache = Arc::new(TtlCache::with_clock(SITEMAP_CACHE_TTL, clock.clone()));
        let db = SitemapDb::open_in_memory().await.unwrap();
        let composer = SitemapComposer::new(db, file.clone(), cache).with_clock(clock.clone());

        Fixture { _dir: dir, file, clock, composer }
    }

    fn locs(doc: &SitemapDocument) -> Vec<&str> {
        doc.urls.iter().map(UrlRecord::loc).collect()
    }

    fn stored(url: &str, priority: f64) -> SitemapEntry {
        SitemapEntry {
            id: 1,
            url: url.to_string(),
            changefreq: ChangeFreq::Daily,
            priority,
            lastmod: None,
            title: None,
            is_custom: true,
            created_at: "2024-05-01T00:00:00Z".to_string(),
            updated_at: "2024-05-02T00:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn test_compose_appends_custom_entries() {
        let fx = fixture().await;
        fx.composer
            .add_custom_entry(
                &NewSitemapEntry::custom("/offers")
                    .with_priority(0.8)
                    .with_changefreq(ChangeFreq::Daily),
            )
            .await
            .unwrap();

        let doc = fx.composer.compose().await.unwrap();
        assert_eq!(locs(&doc), ["/", "/about", "/offers"]);

        let offers = doc.find("/offers").unwrap();
        assert_eq!(offers.changefreq(), Some(ChangeFreq::Daily));
        assert_eq!(offers.priority().map(Priority::as_text), Some("0.8"));
    }

    #[tokio::test]
    async fn test_compose_skips_non_custom_entries() {
        let fx = fixture().await;
        let mut imported = NewSitemapEntry::custom("/imported");
        imported.is_custom = false;
        fx.composer.db().insert_entry(&imported).await.unwrap();

        let doc = fx.composer.compose().await.unwrap();
        assert_eq!(locs(&doc), ["/", "/about"]);
    }

    #[tokio::test]
    async fn test_edit_then_compose_scenario() {
        let fx = fixture().await;
        fx.composer
            .add_custom_entry(
                &NewSitemapEntry::custom("/offers")
                    .with_priority(0.8)
                    .with_changefreq(ChangeFreq::Daily),
            )
            .await
            .unwrap();
        assert_eq!(locs(&fx.composer.compose().await.unwrap()), ["/", "/about", "/offers"]);

        fx.clock.advance(std::time::Duration::from_secs(60));
        let edit = UrlEdit { loc: "/about".into(), changefreq: Some(ChangeFreq::Monthly), priority: Some(0.3) };
        fx.composer.apply_edit(&edit).await.unwrap();

        let doc = fx.composer.compose().await.unwrap();
        assert_eq!(locs(&doc), ["/", "/about", "/offers"]);
        let about = doc.find("/about").unwrap();
        assert_eq!(about.changefreq(), Some(ChangeFreq::Monthly));
        assert_eq!(about.priority().map(Priority::as_text), Some("0.3"));
        assert_eq!(about.lastmod(), Some("2024-06-01T12:01:00Z"));
    }

    #[tokio::test]
    async fn test_apply_edit_unknown_loc_leaves_file_untouched() {
        let fx = fixture().await;
        let before = std::fs::read(fx.file.path()).unwrap();

        let edit = UrlEdit { loc: "/missing".into(), changefreq: Some(ChangeFreq::Never), priority: None };
        let result = fx.composer.apply_edit(&edit).await;

        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(std::fs::read(fx.file.path()).unwrap(), before);
    }

    #[tokio::test]
    async fn test_apply_edit_does_not_touch_custom_entries() {
        let fx = fixture().await;
        fx.composer
            .add_custom_entry(&NewSitemapEntry::custom("/offers"))
            .await
            .unwrap();

        let edit = UrlEdit { loc: "/offers".into(), changefreq: None, priority: Some(0.9) };
        let result = fx.composer.apply_edit(&edit).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_apply_edit_rejects_bad_priority() {
        let fx = fixture().await;
        let edit = UrlEdit { loc: "/about".into(), changefreq: None, priority: Some(2.0) };
        let result = fx.composer.apply_edit(&edit).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_apply_edit_keeps_position() {
        let fx = fixture().await;
        let edit = UrlEdit { loc: "/".into(), changefreq: None, priority: None };
        let updated = fx.composer.apply_edit(&edit).await.unwrap();
        assert_eq!(updated.lastmod(), Some("2024-06-01T12:00:00Z"));

        let raw = fx.file.read().await.unwrap();
        let doc = codec::decode(&raw).unwrap();
        assert_eq!(locs(&doc), ["/", "/about"]);
        assert_eq!(doc.urls[1].lastmod(), Some("2024-01-01T00:00:00Z"));
    }

    #[tokio::test]
    async fn test_compose_missing_static_file() {
        let fx = fixture().await;
        std::fs::remove_file(fx.file.path()).unwrap();

        let result = fx.composer.compose().await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_compose_malformed_static_file() {
        let fx = fixture().await;
        fx.file.write("<urlset><url>").await.unwrap();

        let result = fx.composer.compose().await;
        assert!(matches!(result, Err(Error::MalformedDocument(_))));
    }

    #[tokio::test]
    async fn test_render_caches_until_write() {
        let fx = fixture().await;

        let first = fx.composer.render(RenderFormat::Xml).await.unwrap();
        assert!(!first.cached);
        assert!(first.content.contains("<loc>/about</loc>"));

        let second = fx.composer.render(RenderFormat::Xml).await.unwrap();
        assert!(second.cached);
        assert_eq!(second.etag, first.etag);

        fx.composer
            .add_custom_entry(&NewSitemapEntry::custom("/offers"))
            .await
            .unwrap();
        let third = fx.composer.render(RenderFormat::Xml).await.unwrap();
        assert!(!third.cached);
        assert!(third.content.contains("<loc>/offers</loc>"));
        assert_ne!(third.etag, first.etag);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_render_racing_an_edit_does_not_cache_old_sitemap() {
        let fx = fixture().await;

        // Park the store thread so the render below reads the file and then
        // waits on its custom entry query.
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let (parked_tx, parked_rx) = tokio::sync::oneshot::channel::<()>();
        let conn = fx.composer.db().conn.clone();
        let parked = tokio::spawn(async move {
            conn.call(move |_conn| -> Result<(), tokio_rusqlite::rusqlite::Error> {
                let _ = parked_tx.send(());
                let _ = release_rx.recv();
                Ok(())
            })
            .await
        });
        parked_rx.await.unwrap();

        let edit = UrlEdit { loc: "/about".into(), changefreq: None, priority: Some(0.1) };
        let (raced, ()) = tokio::join!(fx.composer.render(RenderFormat::Xml), async {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            fx.composer.apply_edit(&edit).await.unwrap();
            release_tx.send(()).unwrap();
        });
        raced.unwrap();
        parked.await.unwrap().unwrap();

        let on_disk = fx.file.read().await.unwrap();
        assert!(on_disk.contains("<priority>0.1</priority>"));

        let served = fx.composer.render(RenderFormat::Xml).await.unwrap();
        assert!(!served.cached);
        assert!(served.content.contains("<priority>0.1</priority>"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_edits_are_serialized() {
        let fx = fixture().await;
        let composer = Arc::new(fx.composer);

        for round in 1..=5 {
            let home = UrlEdit { loc: "/".into(), changefreq: None, priority: Some(f64::from(round) / 10.0) };
            let about = UrlEdit {
                loc: "/about".into(),
                changefreq: Some(ChangeFreq::Monthly),
                priority: Some(f64::from(round + 4) / 10.0),
            };

            let (a, b) = {
                let (c1, c2) = (composer.clone(), composer.clone());
                tokio::join!(
                    tokio::spawn(async move { c1.apply_edit(&home).await }),
                    tokio::spawn(async move { c2.apply_edit(&about).await }),
                )
            };
            a.unwrap().unwrap();
            b.unwrap().unwrap();

            let doc = codec::decode(&fx.file.read().await.unwrap()).unwrap();
            let home = doc.find("/").unwrap();
            let about = doc.find("/about").unwrap();
            assert_eq!(home.priority().map(Priority::value), Some(Priority::new(f64::from(round) / 10.0).unwrap().value()));
            assert_eq!(about.priority().map(Priority::value), Some(Priority::new(f64::from(round + 4) / 10.0).unwrap().value()));
            assert_eq!(about.changefreq(), Some(ChangeFreq::Monthly));
        }
    }

    #[tokio::test]
    async fn test_render_expires_after_ttl() {
        let fx = fixture().await;
        fx.composer.render(RenderFormat::Xml).await.unwrap();

        fx.clock.advance(SITEMAP_CACHE_TTL + std::time::Duration::from_secs(1));
        let again = fx.composer.render(RenderFormat::Xml).await.unwrap();
        assert!(!again.cached);
    }

    #[tokio::test]
    async fn test_render_json() {
        let fx = fixture().await;
        let rendered = fx.composer.render(RenderFormat::Json).await.unwrap();
        let summaries: Vec<UrlSummary> = serde_json::from_str(&rendered.content).unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[1].loc, "/about");
        assert_eq!(summaries[1].priority, Some(0.7));
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let fx = fixture().await;
        fx.composer
            .add_custom_entry(&NewSitemapEntry::custom("/offers"))
            .await
            .unwrap();

        fx.composer.delete_entry("/offers").await.unwrap();
        assert_eq!(locs(&fx.composer.compose().await.unwrap()), ["/", "/about"]);

        let result = fx.composer.delete_entry("/offers").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_merge_custom_wins_on_collision() {
        let static_doc = codec::decode(STATIC_SITEMAP).unwrap();
        let merged = merge(static_doc, &[stored("/about", 0.2), stored("/offers", 0.8)]);

        assert_eq!(locs(&merged), ["/", "/about", "/offers"]);
        let about = merged.find("/about").unwrap();
        assert_eq!(about.changefreq(), Some(ChangeFreq::Daily));
        assert_eq!(about.priority().map(Priority::as_text), Some("0.2"));
        assert_eq!(about.lastmod(), Some("2024-05-02T00:00:00Z"));
    }

    #[test]
    fn test_merge_collapses_duplicate_static_locs() {
        let static_doc = SitemapDocument {
            urls: vec![UrlRecord::new("/"), UrlRecord::new("/a"), UrlRecord::new("/")],
            ..Default::default()
        };
        let merged = merge(static_doc, &[]);
        assert_eq!(locs(&merged), ["/", "/a"]);
    }

    #[test]
    fn test_merge_every_entry_exactly_once() {
        let static_doc = codec::decode(STATIC_SITEMAP).unwrap();
        let custom = [stored("/", 0.9), stored("/x", 0.1), stored("/y", 0.1)];
        let merged = merge(static_doc, &custom);

        let all = locs(&merged);
        let unique: HashSet<&str> = all.iter().copied().collect();
        assert_eq!(all.len(), unique.len());
        assert_eq!(all, ["/", "/about", "/x", "/y"]);
    }
}
