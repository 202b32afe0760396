//! Memoizing cache with TTL and call-count refresh ceiling
//!
//! `MemoCache` is the shared response cache behind the directory client.
//! Each entry carries its storage instant and the number of hits it has
//! served; an entry is treated as absent once it is older than `ttl` or,
//! when a nonzero ceiling is configured, once it has served more than `ctl`
//! hits since it was last stored. The caller decides what gets stored:
//! the directory client never inserts empty results, so transient API
//! failures are recomputed on the next access instead of being memoized.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    stored_at: Instant,
    hits: u32,
}

/// Keyed cache with TTL and an optional hit-count refresh ceiling
///
/// `ctl == 0` disables the hit ceiling entirely; hit counters are only
/// maintained when the ceiling is active.
#[derive(Debug, Clone)]
pub struct MemoCache<K, V> {
    entries: Arc<RwLock<HashMap<K, Entry<V>>>>,
    ttl: Duration,
    ctl: u32,
}

impl<K, V> MemoCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Create a cache with the given TTL and no hit ceiling
    pub fn new(ttl: Duration) -> Self {
        Self::with_ctl(ttl, 0)
    }

    /// Create a cache with the given TTL and hit-count refresh ceiling
    pub fn with_ctl(ttl: Duration, ctl: u32) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            ctl,
        }
    }

    /// Look up a key, returning the cached value when still fresh
    ///
    /// Stale entries (expired TTL or exhausted hit ceiling) are removed
    /// and reported as a miss.
    pub async fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.write().await;

        match entries.get_mut(key) {
            Some(entry) => {
                if entry.stored_at.elapsed() > self.ttl {
                    entries.remove(key);
                    return None;
                }
                if self.ctl != 0 {
                    if entry.hits > self.ctl {
                        entries.remove(key);
                        return None;
                    }
                    entry.hits += 1;
                }
                Some(entry.value.clone())
            }
            None => None,
        }
    }

    /// Store a value, replacing any stale entry under the same key
    pub async fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key,
            Entry {
                value,
                stored_at: Instant::now(),
                hits: 0,
            },
        );
    }

    /// Drop all entries unconditionally
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Number of live entries (stale ones included until next access)
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache currently holds no entries
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
