//! In-memory TTL cache
//!
//! Each entry carries its insertion instant; lookups apply the max-age
//! check explicitly and evict on the way out. The cache is an owned field
//! of whichever component uses it; its lifecycle ends with that
//! component's, there is no process-wide store.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// A bounded-age cache of cloneable values
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, (V, Instant)>>,
    max_age: Duration,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(max_age: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_age,
        }
    }

    /// Look up a value; entries older than `max_age` are evicted and miss
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((value, inserted_at)) if inserted_at.elapsed() <= self.max_age => {
                Some(value.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: K, value: V) {
        self.entries.lock().insert(key, (value, Instant::now()));
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.lock().remove(key);
    }

    /// Drop every expired entry
    pub fn purge_expired(&self) {
        let mut entries = self.entries.lock();
        entries.retain(|_, (_, inserted_at)| inserted_at.elapsed() <= self.max_age);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_within_max_age() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::from_secs(60));
        cache.insert("0xabc".to_string(), 42);

        assert_eq!(cache.get(&"0xabc".to_string()), Some(42));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expired_entry_misses_and_evicts() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::ZERO);
        cache.insert("0xabc".to_string(), 42);

        // Zero max-age: anything already inserted is stale
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get(&"0xabc".to_string()), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate() {
        let cache: TtlCache<&'static str, u32> = TtlCache::new(Duration::from_secs(60));
        cache.insert("a", 1);
        cache.insert("b", 2);

        cache.invalidate(&"a");
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get(&"b"), Some(2));
    }

    #[test]
    fn test_purge_expired() {
        let cache: TtlCache<&'static str, u32> = TtlCache::new(Duration::ZERO);
        cache.insert("a", 1);
        cache.insert("b", 2);

        std::thread::sleep(Duration::from_millis(5));
        cache.purge_expired();
        assert!(cache.is_empty());
    }
}
