//! In-memory session cache for fetched universes.
//!
//! Owned by the caller and passed in explicitly; nothing here is global.
//! Entries are keyed by a content hash of the universe plus the provider
//! name, so reordering or editing the universe file produces a fresh fetch.
//! Staleness is decided by an injectable [`InvalidationPolicy`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use rvscreen_core::data::Universe;

use crate::config::CacheConfig;
use crate::fetcher::FetchReport;

/// Decides whether a cached entry of a given age must be refetched.
pub trait InvalidationPolicy: Send + Sync {
    fn is_stale(&self, age: Duration) -> bool;

    fn describe(&self) -> String;
}

/// Entries expire after a fixed time-to-live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub ttl: Duration,
}

impl InvalidationPolicy for TtlPolicy {
    fn is_stale(&self, age: Duration) -> bool {
        age >= self.ttl
    }

    fn describe(&self) -> String {
        format!("ttl {}s", self.ttl.as_secs())
    }
}

/// Entries never expire; only [`FetchCache::invalidate`] or [`FetchCache::clear`] drop them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManualRefresh;

impl InvalidationPolicy for ManualRefresh {
    fn is_stale(&self, _age: Duration) -> bool {
        false
    }

    fn describe(&self) -> String {
        "manual refresh".into()
    }
}

/// Whether a lookup was served from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

struct Entry {
    report: Arc<FetchReport>,
    stored_at: Instant,
}

/// Fetch results for this session, keyed by [`universe_key`].
pub struct FetchCache {
    policy: Box<dyn InvalidationPolicy>,
    entries: Mutex<HashMap<String, Entry>>,
}

impl FetchCache {
    pub fn new(policy: Box<dyn InvalidationPolicy>) -> Self {
        Self {
            policy,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self::new(Box::new(TtlPolicy { ttl }))
    }

    pub fn manual() -> Self {
        Self::new(Box::new(ManualRefresh))
    }

    pub fn from_config(cfg: &CacheConfig) -> Self {
        if cfg.manual_refresh {
            Self::manual()
        } else {
            Self::with_ttl(cfg.ttl())
        }
    }

    pub fn policy(&self) -> &dyn InvalidationPolicy {
        self.policy.as_ref()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fresh entry for `key`, if any. Stale entries are evicted on lookup.
    pub fn get(&self, key: &str) -> Option<Arc<FetchReport>> {
        let mut entries = self.lock();
        let stale = match entries.get(key) {
            Some(entry) => self.policy.is_stale(entry.stored_at.elapsed()),
            None => return None,
        };
        if stale {
            tracing::debug!(key, policy = %self.policy.describe(), "evicting stale fetch");
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|e| Arc::clone(&e.report))
    }

    pub fn insert(&self, key: impl Into<String>, report: FetchReport) -> Arc<FetchReport> {
        let report = Arc::new(report);
        self.lock().insert(
            key.into(),
            Entry {
                report: Arc::clone(&report),
                stored_at: Instant::now(),
            },
        );
        report
    }

    /// Drop one entry. Returns whether it was present.
    pub fn invalidate(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the cached report for `key`, or run `fetch` and cache its result.
    ///
    /// The lock is not held while `fetch` runs. Errors are not cached.
    pub fn get_or_fetch<E, F>(&self, key: &str, fetch: F) -> Result<(Arc<FetchReport>, CacheStatus), E>
    where
        F: FnOnce() -> Result<FetchReport, E>,
    {
        if let Some(report) = self.get(key) {
            tracing::info!(key, "using cached fetch");
            return Ok((report, CacheStatus::Hit));
        }
        let report = fetch()?;
        Ok((self.insert(key, report), CacheStatus::Miss))
    }
}

/// Cache key for a universe fetched through a named provider.
///
/// Hashes the provider name and the ordered ticker list.
pub fn universe_key(universe: &Universe, provider: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(provider.as_bytes());
    hasher.update(&[0]);
    for ticker in universe.tickers() {
        hasher.update(ticker.as_bytes());
        hasher.update(b"\n");
    }
    let hash = hasher.finalize().to_hex();
    format!("{provider}:{}", &hash[..16])
}
