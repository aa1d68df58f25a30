//! In-memory sitemap document.
//!
//! A [`SitemapDocument`] keeps enough of the source markup to write it back
//! unchanged: root attributes, per-record attributes, field order, and any
//! child elements this crate does not interpret (image and news extensions,
//! for example).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Namespace of the sitemaps.org 0.9 protocol.
pub const SITEMAP_NAMESPACE: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Priority given to entries that do not specify one.
pub const DEFAULT_PRIORITY: f64 = 0.5;

/// How often a page is expected to change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChangeFreq {
    Always,
    Hourly,
    Daily,
    #[default]
    Weekly,
    Monthly,
    Yearly,
    Never,
}

impl ChangeFreq {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeFreq::Always => "always",
            ChangeFreq::Hourly => "hourly",
            ChangeFreq::Daily => "daily",
            ChangeFreq::Weekly => "weekly",
            ChangeFreq::Monthly => "monthly",
            ChangeFreq::Yearly => "yearly",
            ChangeFreq::Never => "never",
        }
    }
}

impl fmt::Display for ChangeFreq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeFreq {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(ChangeFreq::Always),
            "hourly" => Ok(ChangeFreq::Hourly),
            "daily" => Ok(ChangeFreq::Daily),
            "weekly" => Ok(ChangeFreq::Weekly),
            "monthly" => Ok(ChangeFreq::Monthly),
            "yearly" => Ok(ChangeFreq::Yearly),
            "never" => Ok(ChangeFreq::Never),
            other => Err(Error::InvalidInput(format!("unknown changefreq: {other}"))),
        }
    }
}

/// A `<priority>` value.
///
/// Keeps the text it was read from so an untouched document writes back
/// byte-for-byte; values built here are normalised to one fractional digit.
#[derive(Debug, Clone, PartialEq)]
pub struct Priority {
    value: f64,
    text: String,
}

impl Priority {
    /// Build a normalised priority, rejecting values outside `0.0..=1.0`.
    pub fn new(value: f64) -> Result<Self, Error> {
        validate_priority(value)?;
        let rounded = (value * 10.0).round() / 10.0;
        Ok(Self { value: rounded, text: format!("{rounded:.1}") })
    }

    /// Like [`Priority::new`], but clamps out-of-range input instead of failing.
    pub fn clamped(value: f64) -> Self {
        let value = if value.is_nan() { DEFAULT_PRIORITY } else { value.clamp(0.0, 1.0) };
        let rounded = (value * 10.0).round() / 10.0;
        Self { value: rounded, text: format!("{rounded:.1}") }
    }

    /// Parse priority text as found in a document, keeping the original text.
    pub(crate) fn parse(text: &str) -> Option<Self> {
        let value = text.trim().parse::<f64>().ok().filter(|v| v.is_finite())?;
        Some(Self { value, text: text.to_string() })
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn as_text(&self) -> &str {
        &self.text
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::clamped(DEFAULT_PRIORITY)
    }
}

/// A generic element kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    /// Trimmed text content.
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// True for an element with no attributes and no children.
    pub fn is_simple(&self) -> bool {
        self.attrs.is_empty() && self.children.is_empty()
    }
}

/// One child of a `<url>` record.
#[derive(Debug, Clone, PartialEq)]
pub enum UrlField {
    Loc(String),
    Lastmod(String),
    Changefreq(ChangeFreq),
    Priority(Priority),
    /// Anything else, including known tags whose content could not be interpreted.
    Other(XmlElement),
}

impl UrlField {
    /// The element name this field is written as.
    pub fn tag(&self) -> &str {
        match self {
            UrlField::Loc(_) => "loc",
            UrlField::Lastmod(_) => "lastmod",
            UrlField::Changefreq(_) => "changefreq",
            UrlField::Priority(_) => "priority",
            UrlField::Other(el) => &el.name,
        }
    }

    /// Position of known fields in the sitemaps.org field order.
    fn rank(&self) -> Option<u8> {
        match self {
            UrlField::Loc(_) => Some(0),
            UrlField::Lastmod(_) => Some(1),
            UrlField::Changefreq(_) => Some(2),
            UrlField::Priority(_) => Some(3),
            UrlField::Other(_) => None,
        }
    }
}

/// One `<url>` record.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlRecord {
    pub attrs: Vec<(String, String)>,
    pub fields: Vec<UrlField>,
}

impl UrlRecord {
    pub fn new(loc: impl Into<String>) -> Self {
        Self { attrs: Vec::new(), fields: vec![UrlField::Loc(loc.into())] }
    }

    pub fn with_lastmod(mut self, lastmod: impl Into<String>) -> Self {
        self.set_lastmod(lastmod);
        self
    }

    pub fn with_changefreq(mut self, changefreq: ChangeFreq) -> Self {
        self.set_changefreq(changefreq);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.set_priority(priority);
        self
    }

    pub fn loc(&self) -> &str {
        self.fields
            .iter()
            .find_map(|f| match f {
                UrlField::Loc(loc) => Some(loc.as_str()),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn lastmod(&self) -> Option<&str> {
        self.fields.iter().find_map(|f| match f {
            UrlField::Lastmod(lastmod) => Some(lastmod.as_str()),
            _ => None,
        })
    }

    pub fn changefreq(&self) -> Option<ChangeFreq> {
        self.fields.iter().find_map(|f| match f {
            UrlField::Changefreq(changefreq) => Some(*changefreq),
            _ => None,
        })
    }

    pub fn priority(&self) -> Option<&Priority> {
        self.fields.iter().find_map(|f| match f {
            UrlField::Priority(priority) => Some(priority),
            _ => None,
        })
    }

    pub fn set_lastmod(&mut self, lastmod: impl Into<String>) {
        self.upsert(UrlField::Lastmod(lastmod.into()));
    }

    pub fn set_changefreq(&mut self, changefreq: ChangeFreq) {
        self.upsert(UrlField::Changefreq(changefreq));
    }

    pub fn set_priority(&mut self, priority: Priority) {
        self.upsert(UrlField::Priority(priority));
    }

    /// Replace the field with the same tag in place, or insert it after the
    /// last known field that precedes it in protocol order.
    fn upsert(&mut self, field: UrlField) {
        if let Some(existing) = self.fields.iter_mut().find(|f| f.tag() == field.tag()) {
            *existing = field;
            return;
        }

        let rank = field.rank();
        let at = self
            .fields
            .iter()
            .rposition(|f| matches!((f.rank(), rank), (Some(a), Some(b)) if a < b))
            .map_or(0, |i| i + 1);
        self.fields.insert(at, field);
    }
}

/// An ordered `<urlset>`.
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapDocument {
    /// Attributes of the root element, namespace declarations included.
    pub root_attrs: Vec<(String, String)>,
    pub urls: Vec<UrlRecord>,
}

impl Default for SitemapDocument {
    fn default() -> Self {
        Self { root_attrs: vec![("xmlns".to_string(), SITEMAP_NAMESPACE.to_string())], urls: Vec::new() }
    }
}

impl SitemapDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self, loc: &str) -> Option<usize> {
        self.urls.iter().position(|u| u.loc() == loc)
    }

    pub fn find(&self, loc: &str) -> Option<&UrlRecord> {
        self.urls.iter().find(|u| u.loc() == loc)
    }

    pub fn find_mut(&mut self, loc: &str) -> Option<&mut UrlRecord> {
        self.urls.iter_mut().find(|u| u.loc() == loc)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// Flat view of a record, as served in JSON renderings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UrlSummary {
    pub loc: String,
    pub lastmod: Option<String>,
    pub changefreq: Option<ChangeFreq>,
    pub priority: Option<f64>,
}

impl From<&UrlRecord> for UrlSummary {
    fn from(record: &UrlRecord) -> Self {
        Self {
            loc: record.loc().to_string(),
            lastmod: record.lastmod().map(str::to_string),
            changefreq: record.changefreq(),
            priority: record.priority().map(Priority::value),
        }
    }
}

/// Reject priorities outside `0.0..=1.0` (NaN included).
pub fn validate_priority(value: f64) -> Result<(), Error> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("priority must be between 0.0 and 1.0, got {value}")))
    }
}

/// Accept W3C dates (`2024-05-01`) and RFC 3339 date-times.
pub fn validate_lastmod(value: &str) -> Result<(), Error> {
    let value = value.trim();
    if NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok() || DateTime::parse_from_rfc3339(value).is_ok() {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("lastmod must be YYYY-MM-DD or an RFC 3339 timestamp, got {value:?}")))
    }
}

/// Trim a URL and reject empty or whitespace-containing values.
pub fn normalize_url(url: &str) -> Result<String, Error> {
    let url = url.trim();
    if url.is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()));
    }
    if url.chars().any(char::is_whitespace) {
        return Err(Error::InvalidInput(format!("url cannot contain whitespace: {url:?}")));
    }
    Ok(url.to_string())
}
