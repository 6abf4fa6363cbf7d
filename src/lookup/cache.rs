//! Bounded TTL cache in front of a lookup service
//!
//! Each `CachedLookup` owns its cache; nothing is shared between
//! instances or batches unless the caller shares the instance. Eviction
//! at capacity is left to [`foyer::Cache`]; expiry is checked on read.

use super::types::LookupService;
use crate::error::HandlerError;
use crate::handler::InputContext;
use crate::value::Record;
use foyer::{Cache, CacheBuilder, LruConfig};
use std::time::{Duration, Instant};

#[derive(Clone)]
struct CachedValue {
    value: Option<Record>,
    inserted: Instant,
}

/// Caches lookup results, including misses
pub struct CachedLookup<L> {
    inner: L,
    capacity: usize,
    ttl: Option<Duration>,
    cache: Option<Cache<String, CachedValue>>,
}

impl<L> std::fmt::Debug for CachedLookup<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedLookup")
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl<L: LookupService> CachedLookup<L> {
    /// Wrap a service with a cache of at most `capacity` entries that never
    /// expire. A capacity of 0 disables caching.
    pub fn new(inner: L, capacity: usize) -> Self {
        let cache = (capacity > 0).then(|| {
            // One shard keeps the capacity bound exact
            CacheBuilder::new(capacity)
                .with_shards(1)
                .with_eviction_config(LruConfig::default())
                .build()
        });
        Self {
            inner,
            capacity,
            ttl: None,
            cache,
        }
    }

    /// Expire entries after `ttl`
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// The wrapped service
    pub fn inner(&self) -> &L {
        &self.inner
    }

    /// Drop every entry
    pub fn clear(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    fn get(&self, cache: &Cache<String, CachedValue>, key: &str) -> Option<Option<Record>> {
        let entry = cache.get(key)?;
        let cached = entry.value();
        let fresh = self
            .ttl
            .map_or(true, |ttl| cached.inserted.elapsed() < ttl);
        if fresh {
            return Some(cached.value.clone());
        }
        drop(entry);
        cache.remove(key);
        None
    }
}

impl<L> CachedLookup<L> {
    /// Number of cached entries, expired ones not yet read included
    pub fn len(&self) -> usize {
        self.cache.as_ref().map_or(0, |cache| cache.usage())
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<L: LookupService> LookupService for CachedLookup<L> {
    fn lookup(&self, ctx: &InputContext) -> Result<Option<Record>, HandlerError> {
        let Some(cache) = &self.cache else {
            return self.inner.lookup(ctx);
        };
        let Some(key) = self.inner.cache_key(ctx) else {
            return self.inner.lookup(ctx);
        };
        if let Some(hit) = self.get(cache, &key) {
            tracing::trace!(key = %key, "Lookup cache hit");
            return Ok(hit);
        }
        // Errors are not cached
        let value = self.inner.lookup(ctx)?;
        cache.insert(
            key,
            CachedValue {
                value: value.clone(),
                inserted: Instant::now(),
            },
        );
        Ok(value)
    }

    fn cache_key(&self, ctx: &InputContext) -> Option<String> {
        self.inner.cache_key(ctx)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
