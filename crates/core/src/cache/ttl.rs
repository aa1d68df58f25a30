//! Key/content store with fixed time-to-live and lazy expiry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::SITEMAP_CACHE_TTL;
use super::clock::{Clock, SystemClock};

static GLOBAL: OnceLock<Arc<TtlCache>> = OnceLock::new();

/// What a cache operation did.
///
/// Callers are free to ignore it; the cache never fails them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// A record was inserted or replaced.
    Stored,
    /// A live record had its expiry extended.
    Refreshed,
    /// A record was removed.
    Removed,
    /// All records were removed; carries how many there were.
    Cleared(usize),
    /// The key had no live record, nothing changed.
    Absent,
    /// The content predates the last invalidation and was not stored.
    Stale,
}

#[derive(Debug, Clone)]
struct CacheRecord {
    content: String,
    expires_at: DateTime<Utc>,
}

impl CacheRecord {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// In-memory cache with a single TTL applied to every record.
///
/// All five operations take the same mutex, so the expiry check and the
/// eviction it triggers happen atomically with respect to other callers.
pub struct TtlCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    records: Mutex<HashMap<String, CacheRecord>>,
    /// Bumped by `invalidate` and `clear`, always while `records` is held.
    generation: AtomicU64,
}

impl TtlCache {
    /// Create a cache backed by the system clock.
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Create a cache that reads time from `clock`.
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { ttl, clock, records: Mutex::new(HashMap::new()), generation: AtomicU64::new(0) }
    }

    /// The process-wide cache instance.
    ///
    /// Created on first access with [`SITEMAP_CACHE_TTL`] and never replaced.
    pub fn global() -> Arc<TtlCache> {
        Arc::clone(GLOBAL.get_or_init(|| {
            tracing::debug!(ttl_secs = SITEMAP_CACHE_TTL.as_secs(), "initializing process-wide sitemap cache");
            Arc::new(TtlCache::new(SITEMAP_CACHE_TTL))
        }))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insert or replace `key`, expiring one TTL from now.
    pub fn set(&self, key: &str, content: impl Into<String>) -> CacheOutcome {
        let expires_at = self.expiry_from_now();
        let mut records = self.lock("set");
        records.insert(key.to_string(), CacheRecord { content: content.into(), expires_at });
        CacheOutcome::Stored
    }

    /// Current invalidation generation.
    ///
    /// Read it before computing content to be stored with
    /// [`TtlCache::set_if_generation`].
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Like [`TtlCache::set`], but drops `content` if `invalidate` or `clear`
    /// ran since `generation` was read.
    pub fn set_if_generation(&self, key: &str, content: impl Into<String>, generation: u64) -> CacheOutcome {
        let expires_at = self.expiry_from_now();
        let mut records = self.lock("set_if_generation");
        if self.generation.load(Ordering::Acquire) != generation {
            tracing::debug!(key, "discarding content computed before invalidation");
            return CacheOutcome::Stale;
        }
        records.insert(key.to_string(), CacheRecord { content: content.into(), expires_at });
        CacheOutcome::Stored
    }

    /// Remove `keys` and start a new generation.
    pub fn invalidate(&self, keys: &[&str]) -> CacheOutcome {
        let mut records = self.lock("invalidate");
        self.generation.fetch_add(1, Ordering::AcqRel);
        let mut removed = false;
        for key in keys {
            removed |= records.remove(*key).is_some();
        }
        if removed { CacheOutcome::Removed } else { CacheOutcome::Absent }
    }

    /// Return the content for `key` if it has a live record.
    ///
    /// A stale record is evicted before reporting the miss.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        let mut records = self.lock("get");
        match records.get(key) {
            Some(record) if record.is_expired(now) => {
                records.remove(key);
                tracing::debug!(key, "cache record expired");
                None
            }
            Some(record) => Some(record.content.clone()),
            None => None,
        }
    }

    /// Remove `key` whether or not it is live.
    pub fn delete(&self, key: &str) -> CacheOutcome {
        let mut records = self.lock("delete");
        match records.remove(key) {
            Some(_) => CacheOutcome::Removed,
            None => CacheOutcome::Absent,
        }
    }

    /// Remove every record.
    pub fn clear(&self) -> CacheOutcome {
        let mut records = self.lock("clear");
        self.generation.fetch_add(1, Ordering::AcqRel);
        let removed = records.len();
        records.clear();
        CacheOutcome::Cleared(removed)
    }

    /// Push the expiry of a live record one TTL past now, keeping its content.
    pub fn refresh(&self, key: &str) -> CacheOutcome {
        let now = self.clock.now();
        let expires_at = self.expiry_from_now();
        let mut records = self.lock("refresh");
        match records.get_mut(key) {
            Some(record) if record.is_expired(now) => {
                records.remove(key);
                CacheOutcome::Absent
            }
            Some(record) => {
                record.expires_at = expires_at;
                CacheOutcome::Refreshed
            }
            None => CacheOutcome::Absent,
        }
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.lock("len").values().filter(|r| !r.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn expiry_from_now(&self) -> DateTime<Utc> {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        self.clock.now().checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Lock the record map.
    ///
    /// A poisoned map may hold a half-applied write, so it is logged,
    /// emptied and handed back; callers then see a miss.
    fn lock(&self, op: &'static str) -> MutexGuard<'_, HashMap<String, CacheRecord>> {
        match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!(op, "sitemap cache lock poisoned; discarding cached records");
                let mut guard = poisoned.into_inner();
                guard.clear();
                self.records.clear_poison();
                guard
            }
        }
    }
}
