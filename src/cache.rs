//! In-memory entity caching.
//!
//! Bounded per-type stores for entities parsed from API responses, keyed by
//! snowflake ID, with TTL expiry and least-recently-used eviction. The cache
//! sits downstream of the dispatcher: endpoint wrappers feed it and consult
//! it to reduce network load, the rate limit core never touches it.

use std::{
    collections::HashMap,
    ops::Deref,
    sync::Arc,
    time::Duration,
};

use tokio::{sync::Mutex, time::Instant};

use crate::{
    config::CacheConfig,
    model::{Channel, Member, Message},
};

struct Entry<T> {
    value: T,
    inserted: Instant,
    touched: u64,
}

struct Store<T> {
    entries: HashMap<u64, Entry<T>>,
    /// Monotonic access counter backing the LRU order.
    tick: u64,
}

/// Bounded store for one entity type.
///
/// Entries expire `ttl` after insertion; inserting into a full store evicts
/// the least recently accessed entry.
pub struct EntityCache<T> {
    inner: Mutex<Store<T>>,
    capacity: usize,
    ttl: Duration,
}

impl<T: Clone> EntityCache<T> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        EntityCache {
            inner: Mutex::new(Store {
                entries: HashMap::new(),
                tick: 0,
            }),
            capacity,
            ttl,
        }
    }

    /// Retrieves an entity if present and unexpired. A hit refreshes the
    /// entry's position in the LRU order; an expired entry is dropped.
    pub async fn get(&self, id: u64) -> Option<T> {
        let mut store = self.inner.lock().await;
        store.tick += 1;
        let tick = store.tick;

        let expired = store.entries.get(&id)?.inserted.elapsed() > self.ttl;

        if expired {
            store.entries.remove(&id);
            return None;
        }

        let entry = store.entries.get_mut(&id)?;
        entry.touched = tick;
        Some(entry.value.clone())
    }

    /// Inserts or replaces an entity, evicting the least recently used entry
    /// when the store is at capacity.
    pub async fn insert(&self, id: u64, value: T) {
        let mut store = self.inner.lock().await;
        store.tick += 1;
        let tick = store.tick;

        if !store.entries.contains_key(&id) && store.entries.len() >= self.capacity {
            let oldest = store
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.touched)
                .map(|(id, _)| *id);

            if let Some(oldest) = oldest {
                store.entries.remove(&oldest);
            }
        }

        store.entries.insert(
            id,
            Entry {
                value,
                inserted: Instant::now(),
                touched: tick,
            },
        );
    }

    /// Removes an entity, if cached.
    pub async fn remove(&self, id: u64) {
        self.inner.lock().await.entries.remove(&id);
    }

    /// Number of cached entries, counting unexpired and expired alike.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Thread-safe handle to the per-type entity stores.
#[derive(Clone)]
pub struct Cache(Arc<InnerCache>);

impl Deref for Cache {
    type Target = InnerCache;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Default for Cache {
    fn default() -> Self {
        Cache::new(&CacheConfig::default())
    }
}

impl Cache {
    /// Builds the stores with the configured capacities and TTLs.
    pub fn new(config: &CacheConfig) -> Self {
        Cache(Arc::new(InnerCache {
            channels: EntityCache::new(
                config.channels.capacity,
                Duration::from_secs(config.channels.ttl_seconds),
            ),
            members: EntityCache::new(
                config.members.capacity,
                Duration::from_secs(config.members.ttl_seconds),
            ),
            messages: EntityCache::new(
                config.messages.capacity,
                Duration::from_secs(config.messages.ttl_seconds),
            ),
        }))
    }
}

/// Per-type entity stores.
pub struct InnerCache {
    /// Channels, keyed by channel ID.
    pub channels: EntityCache<Channel>,
    /// Guild members, keyed by user ID.
    pub members: EntityCache<Member>,
    /// Messages, keyed by message ID.
    pub messages: EntityCache<Message>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize, ttl: Duration) -> EntityCache<u32> {
        EntityCache::new(capacity, ttl)
    }

    #[tokio::test]
    async fn stores_and_retrieves() {
        let cache = cache(4, Duration::from_secs(60));

        cache.insert(1, 10).await;
        assert_eq!(cache.get(1).await, Some(10));
        assert_eq!(cache.get(2).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = cache(4, Duration::from_secs(30));

        cache.insert(1, 10).await;
        tokio::time::advance(Duration::from_secs(31)).await;

        assert_eq!(cache.get(1).await, None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn evicts_least_recently_used() {
        let cache = cache(2, Duration::from_secs(60));

        cache.insert(1, 10).await;
        cache.insert(2, 20).await;

        // Touch 1 so 2 becomes the eviction candidate.
        cache.get(1).await;
        cache.insert(3, 30).await;

        assert_eq!(cache.get(1).await, Some(10));
        assert_eq!(cache.get(2).await, None);
        assert_eq!(cache.get(3).await, Some(30));
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn replacing_does_not_evict() {
        let cache = cache(2, Duration::from_secs(60));

        cache.insert(1, 10).await;
        cache.insert(2, 20).await;
        cache.insert(2, 21).await;

        assert_eq!(cache.get(1).await, Some(10));
        assert_eq!(cache.get(2).await, Some(21));
    }

    #[tokio::test]
    async fn remove_drops_entry() {
        let cache = cache(2, Duration::from_secs(60));

        cache.insert(1, 10).await;
        cache.remove(1).await;

        assert_eq!(cache.get(1).await, None);
    }
}
