//! In-process TTL cache shared by the session stores and the sign-in throttle.
//!
//! Every entry carries its own TTL, creation instant and access counter.
//! Expired entries are dropped lazily on access and eagerly by
//! [`TtlCache::purge_expired`], which the background sweeper calls.

use std::{
    borrow::Borrow,
    collections::{HashMap, hash_map::Entry},
    hash::Hash,
    time::Duration,
};
use tokio::{sync::Mutex, time::Instant};

/// Snapshot of a cache entry.
#[derive(Clone, Debug)]
pub struct CacheItem<V> {
    value: V,
    created_on: Instant,
    // None when `created_on + ttl` overflows; such entries never expire.
    expires_at: Option<Instant>,
    access_count: u64,
}

impl<V> CacheItem<V> {
    fn new(value: V, ttl: Duration) -> Self {
        let created_on = Instant::now();
        Self {
            value,
            created_on,
            expires_at: created_on.checked_add(ttl),
            access_count: 0,
        }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn created_on(&self) -> Instant {
        self.created_on
    }

    /// Number of reads since the entry was (re)inserted.
    pub fn access_count(&self) -> u64 {
        self.access_count
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|expires_at| now < expires_at)
    }
}

#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, CacheItem<V>>>,
}

impl<K, V> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `key`, resetting its creation time and access count.
    pub async fn add(&self, key: K, ttl: Duration, value: V) {
        let mut entries = self.entries.lock().await;
        entries.insert(key, CacheItem::new(value, ttl));
    }

    /// Return a live value and count the access. Expired entries are evicted.
    pub async fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let live = entries.get(key).map(|item| item.is_live(now))?;
        if !live {
            entries.remove(key);
            return None;
        }
        let item = entries.get_mut(key)?;
        item.access_count += 1;
        Some(item.value.clone())
    }

    /// Remove `key` and return its value if it was still live.
    ///
    /// Only one concurrent caller can observe `Some` for the same key.
    pub async fn take<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut entries = self.entries.lock().await;
        let item = entries.remove(key)?;
        item.is_live(Instant::now()).then_some(item.value)
    }

    pub async fn delete<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut entries = self.entries.lock().await;
        entries.remove(key).is_some()
    }

    pub async fn exists<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .is_some_and(|item| item.is_live(Instant::now()))
    }

    /// Touch a live entry (counting the access) or start a fresh one with
    /// `init()`, returning a snapshot taken under the lock.
    pub async fn hit(&self, key: K, ttl: Duration, init: impl FnOnce() -> V) -> CacheItem<V> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.entry(key) {
            Entry::Occupied(mut occupied) if occupied.get().is_live(now) => {
                let item = occupied.get_mut();
                item.access_count += 1;
                item.clone()
            }
            Entry::Occupied(mut occupied) => {
                occupied.insert(CacheItem::new(init(), ttl));
                occupied.get().clone()
            }
            Entry::Vacant(vacant) => vacant.insert(CacheItem::new(init(), ttl)).clone(),
        }
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        let entries = self.entries.lock().await;
        let now = Instant::now();
        entries.values().filter(|item| item.is_live(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every expired entry, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, item| item.is_live(now));
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn get_counts_accesses_until_expiry() {
        let cache = TtlCache::new();
        cache.add("key".to_string(), TTL, 7_u32).await;

        assert_eq!(cache.get("key").await, Some(7));
        assert_eq!(cache.get("key").await, Some(7));
        assert!(cache.exists("key").await);

        advance(TTL).await;
        assert!(!cache.exists("key").await);
        assert_eq!(cache.get("key").await, None);
        // lazily evicted
        assert_eq!(cache.purge_expired().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn take_is_single_use() {
        let cache = TtlCache::new();
        cache.add("refresh".to_string(), TTL, "session").await;

        assert_eq!(cache.take("refresh").await, Some("session"));
        assert_eq!(cache.take("refresh").await, None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn take_ignores_expired_entries() {
        let cache = TtlCache::new();
        cache.add("refresh".to_string(), TTL, "session").await;
        advance(TTL + Duration::from_secs(1)).await;

        assert_eq!(cache.take("refresh").await, None);
        assert!(!cache.delete("refresh").await);
    }

    #[tokio::test(start_paused = true)]
    async fn hit_counts_within_ttl_and_restarts_after() {
        let cache: TtlCache<String, ()> = TtlCache::new();

        let first = cache.hit("alice".to_string(), TTL, || ()).await;
        assert_eq!(first.access_count(), 0);

        advance(Duration::from_secs(10)).await;
        let second = cache.hit("alice".to_string(), TTL, || ()).await;
        assert_eq!(second.access_count(), 1);
        assert_eq!(second.created_on(), first.created_on());

        advance(TTL).await;
        let restarted = cache.hit("alice".to_string(), TTL, || ()).await;
        assert_eq!(restarted.access_count(), 0);
        assert!(restarted.created_on() > first.created_on());
    }

    #[tokio::test(start_paused = true)]
    async fn add_resets_counters() {
        let cache = TtlCache::new();
        cache.add(1_u8, TTL, "a").await;
        cache.hit(1, TTL, || "unused").await;

        cache.add(1, TTL, "b").await;
        let item = cache.hit(1, TTL, || "unused").await;
        assert_eq!(item.value(), &"b");
        assert_eq!(item.access_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_only_expired() {
        let cache = TtlCache::new();
        cache.add(1_u8, Duration::from_secs(10), ()).await;
        cache.add(2_u8, TTL, ()).await;

        advance(Duration::from_secs(30)).await;
        assert_eq!(cache.purge_expired().await, 1);
        assert_eq!(cache.len().await, 1);
        assert!(cache.exists(&2).await);
    }
}
