//! Sitemap entry CRUD operations.
//!
//! Entries are keyed by URL. The store trims and validates every write and
//! maintains `created_at` / `updated_at` itself.

use chrono::{SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{
    self, OptionalExtension, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};

use super::connection::SitemapDb;
use crate::Error;
use crate::sitemap::model::{ChangeFreq, DEFAULT_PRIORITY, normalize_url, validate_lastmod, validate_priority};

const ENTRY_COLUMNS: &str = "id, url, changefreq, priority, lastmod, title, is_custom, created_at, updated_at";

/// A stored sitemap entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SitemapEntry {
    pub id: i64,
    pub url: String,
    pub changefreq: ChangeFreq,
    pub priority: f64,
    pub lastmod: Option<String>,
    pub title: Option<String>,
    pub is_custom: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields for a new entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NewSitemapEntry {
    pub url: String,
    #[serde(default)]
    pub changefreq: ChangeFreq,
    #[serde(default = "default_priority")]
    pub priority: f64,
    #[serde(default)]
    pub lastmod: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "default_true")]
    pub is_custom: bool,
}

fn default_priority() -> f64 {
    DEFAULT_PRIORITY
}

fn default_true() -> bool {
    true
}

impl NewSitemapEntry {
    /// A custom entry with default changefreq and priority.
    pub fn custom(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            changefreq: ChangeFreq::default(),
            priority: DEFAULT_PRIORITY,
            lastmod: None,
            title: None,
            is_custom: true,
        }
    }

    pub fn with_changefreq(mut self, changefreq: ChangeFreq) -> Self {
        self.changefreq = changefreq;
        self
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    /// Trim and validate, returning the entry as it will be stored.
    pub fn normalized(&self) -> Result<Self, Error> {
        validate_priority(self.priority)?;
        let lastmod = normalize_optional(self.lastmod.as_deref());
        if let Some(lastmod) = &lastmod {
            validate_lastmod(lastmod)?;
        }

        Ok(Self {
            url: normalize_url(&self.url)?,
            changefreq: self.changefreq,
            priority: self.priority,
            lastmod,
            title: normalize_optional(self.title.as_deref()),
            is_custom: self.is_custom,
        })
    }
}

/// Partial update of a stored entry. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EntryUpdate {
    #[serde(default)]
    pub changefreq: Option<ChangeFreq>,
    #[serde(default)]
    pub priority: Option<f64>,
    #[serde(default)]
    pub lastmod: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub is_custom: Option<bool>,
}

impl EntryUpdate {
    fn validate(&self) -> Result<(), Error> {
        if let Some(priority) = self.priority {
            validate_priority(priority)?;
        }
        if let Some(lastmod) = normalize_optional(self.lastmod.as_deref()) {
            validate_lastmod(&lastmod)?;
        }
        Ok(())
    }

    fn apply(&self, entry: &mut SitemapEntry) {
        if let Some(changefreq) = self.changefreq {
            entry.changefreq = changefreq;
        }
        if let Some(priority) = self.priority {
            entry.priority = priority;
        }
        if self.lastmod.is_some() {
            entry.lastmod = normalize_optional(self.lastmod.as_deref());
        }
        if self.title.is_some() {
            entry.title = normalize_optional(self.title.as_deref());
        }
        if let Some(is_custom) = self.is_custom {
            entry.is_custom = is_custom;
        }
    }
}

/// Trim an optional string, mapping blank values to `None`.
fn normalize_optional(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl ToSql for ChangeFreq {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ChangeFreq {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str()?.parse().map_err(|_| FromSqlError::InvalidType)
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<SitemapEntry> {
    Ok(SitemapEntry {
        id: row.get(0)?,
        url: row.get(1)?,
        changefreq: row.get(2)?,
        priority: row.get(3)?,
        lastmod: row.get(4)?,
        title: row.get(5)?,
        is_custom: row.get::<_, i32>(6)? == 1,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn select_by_url(conn: &rusqlite::Connection, url: &str) -> rusqlite::Result<Option<SitemapEntry>> {
    conn.query_row(
        &format!("SELECT {ENTRY_COLUMNS} FROM sitemap_entries WHERE url = ?1"),
        params![url],
        entry_from_row,
    )
    .optional()
}

impl SitemapDb {
    /// Insert a new entry.
    ///
    /// Fails with `Error::DuplicateUrl` if the URL is already stored.
    pub async fn insert_entry(&self, entry: &NewSitemapEntry) -> Result<SitemapEntry, Error> {
        let entry = entry.normalized()?;
        let now = now_timestamp();
        self.conn
            .call(move |conn| -> Result<SitemapEntry, Error> {
                let inserted = conn.execute(
                    "INSERT INTO sitemap_entries
                        (url, changefreq, priority, lastmod, title, is_custom, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                    ON CONFLICT(url) DO NOTHING",
                    params![
                        &entry.url,
                        entry.changefreq,
                        entry.priority,
                        &entry.lastmod,
                        &entry.title,
                        entry.is_custom as i32,
                        &now,
                    ],
                )?;
                if inserted == 0 {
                    return Err(Error::DuplicateUrl(entry.url));
                }

                select_by_url(conn, &entry.url)?
                    .ok_or_else(|| Error::NotFound(format!("entry {} vanished after insert", entry.url)))
            })
            .await
            .map_err(Error::from)
    }

    /// Insert an entry, or mark an existing one as custom and overwrite its fields.
    pub async fn activate_entry(&self, entry: &NewSitemapEntry) -> Result<SitemapEntry, Error> {
        let entry = entry.normalized()?;
        let now = now_timestamp();
        self.conn
            .call(move |conn| -> Result<SitemapEntry, Error> {
                conn.execute(
                    "INSERT INTO sitemap_entries
                        (url, changefreq, priority, lastmod, title, is_custom, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)
                    ON CONFLICT(url) DO UPDATE SET
                        changefreq = excluded.changefreq,
                        priority = excluded.priority,
                        lastmod = excluded.lastmod,
                        title = COALESCE(excluded.title, sitemap_entries.title),
                        is_custom = 1,
                        updated_at = excluded.updated_at",
                    params![&entry.url, entry.changefreq, entry.priority, &entry.lastmod, &entry.title, &now],
                )?;

                select_by_url(conn, &entry.url)?
                    .ok_or_else(|| Error::NotFound(format!("entry {} vanished after upsert", entry.url)))
            })
            .await
            .map_err(Error::from)
    }

    /// Get an entry by URL.
    ///
    /// Returns None if the URL is not stored.
    pub async fn get_entry(&self, url: &str) -> Result<Option<SitemapEntry>, Error> {
        let url = url.trim().to_string();
        self.conn
            .call(move |conn| -> Result<Option<SitemapEntry>, Error> { Ok(select_by_url(conn, &url)?) })
            .await
            .map_err(Error::from)
    }

    /// Apply a partial update to the entry stored under `url`.
    ///
    /// Fails with `Error::NotFound` if the URL is not stored.
    pub async fn update_entry(&self, url: &str, update: &EntryUpdate) -> Result<SitemapEntry, Error> {
        update.validate()?;
        let url = url.trim().to_string();
        let update = update.clone();
        let now = now_timestamp();
        self.conn
            .call(move |conn| -> Result<SitemapEntry, Error> {
                let mut entry =
                    select_by_url(conn, &url)?.ok_or_else(|| Error::NotFound(format!("no sitemap entry for {url}")))?;
                update.apply(&mut entry);
                entry.updated_at = now;

                conn.execute(
                    "UPDATE sitemap_entries SET
                        changefreq = ?2, priority = ?3, lastmod = ?4, title = ?5, is_custom = ?6, updated_at = ?7
                    WHERE url = ?1",
                    params![
                        &entry.url,
                        entry.changefreq,
                        entry.priority,
                        &entry.lastmod,
                        &entry.title,
                        entry.is_custom as i32,
                        &entry.updated_at,
                    ],
                )?;
                Ok(entry)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the entry stored under `url`.
    ///
    /// Returns whether an entry was removed.
    pub async fn delete_entry(&self, url: &str) -> Result<bool, Error> {
        let url = url.trim().to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM sitemap_entries WHERE url = ?1", params![url])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// All entries in insertion order.
    pub async fn list_entries(&self) -> Result<Vec<SitemapEntry>, Error> {
        self.query_entries(format!("SELECT {ENTRY_COLUMNS} FROM sitemap_entries ORDER BY created_at, id"))
            .await
    }

    /// Entries with `is_custom` set, in insertion order.
    pub async fn list_custom_entries(&self) -> Result<Vec<SitemapEntry>, Error> {
        self.query_entries(format!(
            "SELECT {ENTRY_COLUMNS} FROM sitemap_entries WHERE is_custom = 1 ORDER BY created_at, id"
        ))
        .await
    }

    async fn query_entries(&self, sql: String) -> Result<Vec<SitemapEntry>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<SitemapEntry>, Error> {
                let mut stmt = conn.prepare(&sql)?;
                let entries = stmt
                    .query_map([], entry_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await
            .map_err(Error::from)
    }
}
