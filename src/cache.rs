//! Bounded cache with age-based eviction.
//!
//! Replaces the ambient per-process maps the gallery previously used for
//! secondary data such as profile names, avatars, and presence heartbeats.
//! Callers construct and inject an instance instead of touching global
//! state; in practice the key is a `(gallery_id, device_id)` pair.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// A map bounded by entry count and entry age.
#[derive(Debug)]
pub struct MediaCache<K, V> {
    entries: HashMap<K, Entry<V>>,
    max_entries: usize,
    max_age: Duration,
}

impl<K: Eq + Hash + Clone, V> MediaCache<K, V> {
    pub fn new(max_entries: usize, max_age: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries: max_entries.max(1),
            max_age,
        }
    }

    /// Returns the cached value, evicting it first if it has expired.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let expired = self
            .entries
            .get(key)
            .is_some_and(|e| e.inserted_at.elapsed() > self.max_age);
        if expired {
            self.entries.remove(key);
        }
        self.entries.get(key).map(|e| &e.value)
    }

    /// Inserts a value, evicting the oldest entry when the cache is full.
    pub fn set(&mut self, key: K, value: V) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.evict_oldest();
        }
        self.entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn evict(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|e| e.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.inserted_at)
            .map(|(k, _)| k.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }
}
