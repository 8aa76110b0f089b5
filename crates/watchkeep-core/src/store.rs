//! Tiered cache store: one canonical in-memory array per cache class plus a
//! TTL-bounded persistent mirror.
//!
//! The canonical array is the single source of truth for all projections.
//! Persisted copies are field-pruned (large nested state like per-episode
//! detail is `#[serde(skip)]` on the record types) and adopted on cold start
//! when still within TTL and owned by the current identity.

use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use watchkeep_models::{MovieHistoryEntry, SeriesProgress, WatchlistCategory, WatchlistEntry};
use watchkeep_source::{EnvelopeStore, SourceError};

use crate::error::CacheError;

/// Identifies one cache class (one canonical array).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheClass {
    Progress,
    MovieHistory,
    Watchlist(WatchlistCategory),
}

impl CacheClass {
    /// Key under which this class lives in the persistent tier.
    pub fn store_key(&self) -> String {
        match self {
            CacheClass::Progress => "progress".to_string(),
            CacheClass::MovieHistory => "movie_history".to_string(),
            CacheClass::Watchlist(category) => format!("watchlist_{}", category.as_str()),
        }
    }

    pub fn all() -> Vec<CacheClass> {
        let mut classes = vec![CacheClass::Progress, CacheClass::MovieHistory];
        classes.extend(WatchlistCategory::all().into_iter().map(CacheClass::Watchlist));
        classes
    }
}

/// A record that can live in a cache store's canonical array.
pub trait CacheRecord: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn cache_key(&self) -> &str;
}

impl CacheRecord for SeriesProgress {
    fn cache_key(&self) -> &str {
        &self.series_id
    }
}

impl CacheRecord for MovieHistoryEntry {
    fn cache_key(&self) -> &str {
        &self.id
    }
}

impl CacheRecord for WatchlistEntry {
    fn cache_key(&self) -> &str {
        &self.id
    }
}

pub struct CacheStore<T> {
    class: CacheClass,
    items: Vec<T>,
    fully_loaded: bool,
    fetching: bool,
    page_size: usize,
    ttl_seconds: i64,
    owner_key: String,
}

impl<T: CacheRecord> CacheStore<T> {
    pub fn new(class: CacheClass, page_size: usize, ttl_seconds: i64, owner_key: String) -> Self {
        Self {
            class,
            items: Vec::new(),
            fully_loaded: false,
            fetching: false,
            page_size,
            ttl_seconds,
            owner_key,
        }
    }

    pub fn class(&self) -> CacheClass {
        self.class
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_fully_loaded(&self) -> bool {
        self.fully_loaded
    }

    pub fn is_fetching(&self) -> bool {
        self.fetching
    }

    pub fn total_pages(&self) -> usize {
        self.items.len().div_ceil(self.page_size)
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.items.iter().find(|item| item.cache_key() == key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut T> {
        self.items.iter_mut().find(|item| item.cache_key() == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert or replace one canonical record by key.
    pub fn upsert_one(&mut self, record: T) {
        match self
            .items
            .iter_mut()
            .find(|item| item.cache_key() == record.cache_key())
        {
            Some(existing) => *existing = record,
            None => self.items.push(record),
        }
    }

    /// Delete one canonical record by key.
    pub fn remove_one(&mut self, key: &str) -> Option<T> {
        let position = self.items.iter().position(|item| item.cache_key() == key)?;
        Some(self.items.remove(position))
    }

    /// Delete every record matching the predicate, returning how many went.
    pub fn remove_where(&mut self, predicate: impl Fn(&T) -> bool) -> usize {
        let before = self.items.len();
        self.items.retain(|item| !predicate(item));
        before - self.items.len()
    }

    /// Adopt a freshly fetched canonical array and mark the class fully loaded.
    pub fn replace_all(&mut self, items: Vec<T>) {
        self.items = items;
        self.fully_loaded = true;
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.fully_loaded = false;
    }

    /// Write the canonical array to the persistent tier. The record types
    /// skip-serialize their heavy fields, so this is always the pruned form.
    /// Persist failures are logged and swallowed: the in-memory tier stays
    /// authoritative and the next persist will retry.
    pub fn persist(&self, persistent: &EnvelopeStore) {
        let key = self.class.store_key();
        if let Err(e) = persistent.set(&key, &self.items, &self.owner_key, self.ttl_seconds) {
            warn!("Failed to persist cache class {}: {}", key, e);
        }
    }

    /// Try to adopt the persistent-tier copy. Misses (absent, expired,
    /// foreign-owned, corrupted) leave the store untouched.
    pub fn adopt_persisted(&mut self, persistent: &EnvelopeStore) -> bool {
        let key = self.class.store_key();
        match persistent.get::<T>(&key, &self.owner_key) {
            Ok(Some(items)) => {
                debug!("Adopted persisted cache for {} ({} items)", key, items.len());
                self.replace_all(items);
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("Failed to read persisted cache for {}: {}", key, e);
                false
            }
        }
    }
}

pub type SharedStore<T> = Arc<RwLock<CacheStore<T>>>;

pub fn shared<T: CacheRecord>(store: CacheStore<T>) -> SharedStore<T> {
    Arc::new(RwLock::new(store))
}

/// Load a cache class, going through the tiers in order: in-memory canonical
/// array, persistent mirror, remote fetch.
///
/// Exactly one full-population fetch runs per class: a caller arriving while
/// a fetch is outstanding observes the `fetching` flag and receives the
/// current (possibly empty) contents instead of fetching again. A failed
/// fetch leaves the cache in its last-known-good state.
pub async fn load_shared<T, F, Fut>(
    store: &SharedStore<T>,
    persistent: &EnvelopeStore,
    use_cache: bool,
    fetch: F,
) -> Result<Vec<T>, CacheError>
where
    T: CacheRecord,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>, SourceError>>,
{
    {
        let mut guard = store.write().await;
        if use_cache && guard.is_fully_loaded() {
            return Ok(guard.items().to_vec());
        }
        if guard.is_fetching() {
            debug!(
                "Load for {} already in flight, returning current contents",
                guard.class().store_key()
            );
            return Ok(guard.items().to_vec());
        }
        if use_cache && guard.adopt_persisted(persistent) {
            return Ok(guard.items().to_vec());
        }
        guard.fetching = true;
    }

    let fetched = fetch().await;

    let mut guard = store.write().await;
    guard.fetching = false;
    match fetched {
        Ok(items) => {
            info!(
                "Populated cache class {} with {} items",
                guard.class().store_key(),
                items.len()
            );
            guard.replace_all(items);
            guard.persist(persistent);
            Ok(guard.items().to_vec())
        }
        Err(e) => {
            warn!(
                "Remote fetch failed for {}: {} (cache unchanged)",
                guard.class().store_key(),
                e
            );
            Err(CacheError::Transport(e))
        }
    }
}

/// The four watchlist category stores, one canonical array each.
#[derive(Clone)]
pub struct WatchlistStores {
    movies: SharedStore<WatchlistEntry>,
    series: SharedStore<WatchlistEntry>,
    seasons: SharedStore<WatchlistEntry>,
    episodes: SharedStore<WatchlistEntry>,
}

impl WatchlistStores {
    pub fn new(page_size: usize, ttl_seconds: i64, owner_key: &str) -> Self {
        let make = |category| {
            shared(CacheStore::new(
                CacheClass::Watchlist(category),
                page_size,
                ttl_seconds,
                owner_key.to_string(),
            ))
        };
        Self {
            movies: make(WatchlistCategory::Movies),
            series: make(WatchlistCategory::Series),
            seasons: make(WatchlistCategory::Seasons),
            episodes: make(WatchlistCategory::Episodes),
        }
    }

    pub fn store(&self, category: WatchlistCategory) -> &SharedStore<WatchlistEntry> {
        match category {
            WatchlistCategory::Movies => &self.movies,
            WatchlistCategory::Series => &self.series,
            WatchlistCategory::Seasons => &self.seasons,
            WatchlistCategory::Episodes => &self.episodes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{movie_entry, series_progress};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn progress_store() -> CacheStore<SeriesProgress> {
        CacheStore::new(CacheClass::Progress, 2, 3600, "user1".to_string())
    }

    #[test]
    fn test_upsert_inserts_then_replaces() {
        let mut store = progress_store();
        store.upsert_one(series_progress("s1", "Alpha", 1, 10));
        store.upsert_one(series_progress("s2", "Beta", 2, 10));
        assert_eq!(store.len(), 2);

        store.upsert_one(series_progress("s1", "Alpha Renamed", 3, 10));
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("s1").unwrap().meta.name, "Alpha Renamed");
    }

    #[test]
    fn test_remove_one() {
        let mut store = progress_store();
        store.upsert_one(series_progress("s1", "Alpha", 1, 10));
        assert!(store.remove_one("s1").is_some());
        assert!(store.remove_one("s1").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_total_pages() {
        let mut store = progress_store();
        assert_eq!(store.total_pages(), 0);
        for i in 0..5 {
            store.upsert_one(series_progress(&format!("s{}", i), "X", 1, 10));
        }
        assert_eq!(store.total_pages(), 3);
    }

    #[tokio::test]
    async fn test_load_cold_then_warm() {
        let dir = tempfile::tempdir().unwrap();
        let persistent = EnvelopeStore::new(dir.path()).unwrap();
        let store = shared(progress_store());
        let fetches = AtomicUsize::new(0);

        let loaded = load_shared(&store, &persistent, true, || async {
            fetches.fetch_add(1, Ordering::SeqCst);
            Ok(vec![series_progress("s1", "Alpha", 1, 10)])
        })
        .await
        .unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        // Second load hits the in-memory canonical array
        let loaded = load_shared(&store, &persistent, true, || async {
            fetches.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        })
        .await
        .unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        // A cold store with the same persistent tier adopts the pruned copy
        // without a remote fetch
        let cold = shared(progress_store());
        let loaded = load_shared(&cold, &persistent, true, || async {
            fetches.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        })
        .await
        .unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_bypasses_cache_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        let persistent = EnvelopeStore::new(dir.path()).unwrap();
        let store = shared(progress_store());

        load_shared(&store, &persistent, true, || async {
            Ok(vec![series_progress("s1", "Alpha", 1, 10)])
        })
        .await
        .unwrap();

        let loaded = load_shared(&store, &persistent, false, || async {
            Ok(vec![
                series_progress("s1", "Alpha", 1, 10),
                series_progress("s2", "Beta", 1, 10),
            ])
        })
        .await
        .unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_cache_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let persistent = EnvelopeStore::new(dir.path()).unwrap();
        let store = shared(progress_store());

        load_shared(&store, &persistent, true, || async {
            Ok(vec![series_progress("s1", "Alpha", 1, 10)])
        })
        .await
        .unwrap();

        let result = load_shared(&store, &persistent, false, || async {
            Err(SourceError::new("connection reset".to_string()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(store.read().await.len(), 1);
        assert!(!store.read().await.is_fetching());
    }

    #[tokio::test]
    async fn test_reentrant_load_does_not_refetch() {
        let dir = tempfile::tempdir().unwrap();
        let persistent = EnvelopeStore::new(dir.path()).unwrap();
        let store = shared(CacheStore::<MovieHistoryEntry>::new(
            CacheClass::MovieHistory,
            2,
            3600,
            "user1".to_string(),
        ));

        // Simulate an outstanding fetch
        store.write().await.fetching = true;

        let fetches = AtomicUsize::new(0);
        let loaded = load_shared(&store, &persistent, true, || async {
            fetches.fetch_add(1, Ordering::SeqCst);
            Ok(vec![movie_entry("m1", "Movie", None)])
        })
        .await
        .unwrap();

        // Racing caller gets the current (empty) contents and no second fetch
        assert!(loaded.is_empty());
        assert_eq!(fetches.load(Ordering::SeqCst), 0);
    }
}
