//! # cache
//!
//! TTL cache with an injected clock, and a [`SongCatalog`] decorator that
//! caches the song listing until it expires or is invalidated.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use louvor_types::{Song, SongId};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StoreError;
use crate::store::{SongCatalog, SongLibrary};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Shared between clones.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

struct CacheEntry<V> {
    value: V,
    stored_at: DateTime<Utc>,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.stored_at > self.ttl
    }
}

pub struct TtlCache<K, V, C = SystemClock> {
    entries: HashMap<K, CacheEntry<V>>,
    default_ttl: Duration,
    clock: C,
}

impl<K: Eq + Hash, V: Clone, C: Clock> TtlCache<K, V, C> {
    pub fn new(default_ttl: Duration, clock: C) -> Self {
        Self {
            entries: HashMap::new(),
            default_ttl,
            clock,
        }
    }

    /// Returns a live value. Expired entries are dropped on access.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let now = self.clock.now();
        if self.entries.get(key)?.is_expired(now) {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|e| e.value.clone())
    }

    pub fn insert(&mut self, key: K, value: V) {
        let ttl = self.default_ttl;
        self.insert_with_ttl(key, value, ttl);
    }

    pub fn insert_with_ttl(&mut self, key: K, value: V, ttl: Duration) {
        let stored_at = self.clock.now();
        self.entries.insert(key, CacheEntry { value, stored_at, ttl });
    }

    pub fn invalidate(&mut self, key: &K) {
        self.entries.remove(key);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(now));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Cached Catalog ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CatalogKey {
    Songs,
}

/// Caches `list_songs` of the wrapped catalog. Writes through
/// [`SongLibrary`] invalidate the cache.
pub struct CachedCatalog<S, C = SystemClock> {
    inner: S,
    cache: RwLock<TtlCache<CatalogKey, Vec<Song>, C>>,
}

impl<S: SongCatalog, C: Clock> CachedCatalog<S, C> {
    pub fn new(inner: S, ttl: Duration, clock: C) -> Self {
        Self {
            inner,
            cache: RwLock::new(TtlCache::new(ttl, clock)),
        }
    }

    pub async fn invalidate(&self) {
        self.cache.write().await.clear();
    }
}

#[async_trait]
impl<S: SongCatalog, C: Clock> SongCatalog for CachedCatalog<S, C> {
    async fn list_songs(&self) -> Result<Vec<Song>, StoreError> {
        // Lock held across the reload: invalidations wait for the insert.
        let mut cache = self.cache.write().await;
        if let Some(songs) = cache.get(&CatalogKey::Songs) {
            return Ok(songs);
        }

        debug!("Catalog cache miss, loading songs");
        let songs = self.inner.list_songs().await?;
        cache.insert(CatalogKey::Songs, songs.clone());
        Ok(songs)
    }
}

#[async_trait]
impl<S: SongLibrary, C: Clock> SongLibrary for CachedCatalog<S, C> {
    async fn save_song(&self, song: Song) -> Result<(), StoreError> {
        let result = self.inner.save_song(song).await;
        self.invalidate().await;
        result
    }

    async fn delete_song(&self, id: SongId) -> Result<bool, StoreError> {
        let result = self.inner.delete_song(id).await;
        self.invalidate().await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LocalStore;
    use chrono::TimeZone;

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap())
    }

    #[test]
    fn entries_expire_after_ttl() {
        let clock = clock();
        let mut cache = TtlCache::new(Duration::minutes(5), clock.clone());
        cache.insert("repertoire", 1);
        cache.insert_with_ttl("musics", 2, Duration::minutes(10));

        clock.advance(Duration::minutes(5));
        assert_eq!(cache.get(&"repertoire"), Some(1));

        clock.advance(Duration::seconds(1));
        assert_eq!(cache.get(&"repertoire"), None);
        assert_eq!(cache.get(&"musics"), Some(2));

        clock.advance(Duration::minutes(5));
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn explicit_invalidation() {
        let mut cache = TtlCache::new(Duration::minutes(5), clock());
        cache.insert(1, "a");
        cache.insert(2, "b");
        cache.invalidate(&1);
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert_eq!(cache.get(&2), None);
    }

    #[tokio::test]
    async fn cached_catalog_serves_stale_listing_until_invalidated() {
        let store = LocalStore::in_memory();
        let clock = clock();
        let cached = CachedCatalog::new(store.clone(), Duration::minutes(5), clock.clone());

        assert!(cached.list_songs().await.unwrap().is_empty());

        // Written behind the decorator's back: not visible until expiry.
        store.save_song(Song::new("Santo", "...")).await.unwrap();
        assert!(cached.list_songs().await.unwrap().is_empty());

        clock.advance(Duration::minutes(6));
        assert_eq!(cached.list_songs().await.unwrap().len(), 1);

        // Written through the decorator: invalidated immediately.
        cached.save_song(Song::new("Digno", "...")).await.unwrap();
        assert_eq!(cached.list_songs().await.unwrap().len(), 2);
    }

    /// Catalog whose listing parks until released.
    struct GatedCatalog {
        store: LocalStore,
        entered: Arc<tokio::sync::Notify>,
        release: Arc<tokio::sync::Notify>,
    }

    #[async_trait]
    impl SongCatalog for GatedCatalog {
        async fn list_songs(&self) -> Result<Vec<Song>, StoreError> {
            let songs = self.store.list_songs().await?;
            self.entered.notify_one();
            self.release.notified().await;
            Ok(songs)
        }
    }

    #[async_trait]
    impl SongLibrary for GatedCatalog {
        async fn save_song(&self, song: Song) -> Result<(), StoreError> {
            self.store.save_song(song).await
        }

        async fn delete_song(&self, id: SongId) -> Result<bool, StoreError> {
            self.store.delete_song(id).await
        }
    }

    #[tokio::test]
    async fn write_during_reload_is_not_masked_by_the_old_listing() {
        let entered = Arc::new(tokio::sync::Notify::new());
        let release = Arc::new(tokio::sync::Notify::new());
        let gated = GatedCatalog {
            store: LocalStore::in_memory(),
            entered: entered.clone(),
            release: release.clone(),
        };
        let cached = Arc::new(CachedCatalog::new(gated, Duration::minutes(5), clock()));

        let reader = tokio::spawn({
            let cached = cached.clone();
            async move { cached.list_songs().await }
        });
        entered.notified().await;

        let writer = tokio::spawn({
            let cached = cached.clone();
            async move { cached.save_song(Song::new("Digno", "...")).await }
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        release.notify_one();
        assert!(reader.await.unwrap().unwrap().is_empty());
        writer.await.unwrap().unwrap();

        // The reload below parks too; hand it a permit up front.
        release.notify_one();
        assert_eq!(cached.list_songs().await.unwrap().len(), 1);
    }
}
