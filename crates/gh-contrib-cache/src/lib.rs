//! Size-bounded key/value cache with on-disk snapshot persistence
//!
//! The cache is an optimization, never a source of truth: a missing,
//! unreadable, or corrupt snapshot file degrades to a cold start, and a
//! failed `save()` is logged and swallowed so the in-memory operation that
//! triggered it still succeeds.
//!
//! Entry size is computed by a pluggable weigher so the budget can track
//! actual data volume (e.g. number of contributors stored per repository)
//! instead of entry count. Eviction is least-recently-used.
//!
//! The cache itself is single-threaded; consumers share it behind an
//! `Arc<Mutex<…>>` and call `save()` after each round of mutations.

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Computes the weight of a value against the cache budget.
pub type Weigher<V> = fn(&V) -> usize;

fn unit_weigher<V>(_: &V) -> usize {
    1
}

/// Point-in-time cache counters, for logging and status endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub weight: usize,
    pub max_weight: usize,
}

/// An LRU cache bounded by total weighted size, optionally snapshotted to a
/// JSON file.
///
/// Keys are strings (repository URLs, `org/username` pairs). Values only
/// need `Serialize`/`DeserializeOwned` when persistence is used.
pub struct StoredLruCache<V> {
    entries: HashMap<String, V>,
    /// Keys ordered least- to most-recently used.
    order: Vec<String>,
    max_weight: usize,
    weight: usize,
    weigher: Weigher<V>,
    path: Option<PathBuf>,
}

impl<V> StoredLruCache<V> {
    /// An in-memory cache with one unit of weight per entry.
    pub fn new(max_weight: usize) -> Self {
        Self::with_weigher(max_weight, unit_weigher::<V>)
    }

    /// An in-memory cache with a custom weigher.
    pub fn with_weigher(max_weight: usize, weigher: Weigher<V>) -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            max_weight,
            weight: 0,
            weigher,
            path: None,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Look up `key` and mark it most-recently used.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        if !self.entries.contains_key(key) {
            return None;
        }
        self.touch(key);
        self.entries.get(key)
    }

    /// Insert or replace `key`, evicting least-recently-used entries until
    /// the new value fits. A value heavier than the whole budget is dropped.
    pub fn set(&mut self, key: String, value: V) {
        self.remove(&key);

        let added = (self.weigher)(&value);
        if added > self.max_weight {
            debug!(
                "cache entry {key} (weight {added}) exceeds budget {}, dropped",
                self.max_weight
            );
            return;
        }
        while self.weight + added > self.max_weight {
            let Some(lru) = self.order.first().cloned() else {
                break;
            };
            debug!("evicting cache entry {lru}");
            self.remove(&lru);
        }

        self.weight += added;
        self.order.push(key.clone());
        self.entries.insert(key, value);
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        let value = self.entries.remove(key)?;
        self.weight -= (self.weigher)(&value);
        self.order.retain(|k| k != key);
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            weight: self.weight,
            max_weight: self.max_weight,
        }
    }

    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            let k = self.order.remove(pos);
            self.order.push(k);
        }
    }
}

impl<V: Serialize + DeserializeOwned> StoredLruCache<V> {
    /// A cache backed by a snapshot file. An existing snapshot is loaded
    /// eagerly; any failure to read or parse it is a cold start.
    pub fn with_snapshot(
        path: impl Into<PathBuf>,
        max_weight: usize,
        weigher: Weigher<V>,
    ) -> Self {
        let mut cache = Self::with_weigher(max_weight, weigher);
        let path = path.into();
        cache.load(&path);
        cache.path = Some(path);
        cache
    }

    /// Serialize the full cache state (entries in LRU order) to the snapshot
    /// file. Failures are logged and swallowed.
    pub fn save(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let pairs: Vec<(&String, &V)> = self
            .order
            .iter()
            .filter_map(|k| self.entries.get(k).map(|v| (k, v)))
            .collect();
        let bytes = match serde_json::to_vec(&pairs) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("failed to serialize cache snapshot {}: {err}", path.display());
                return;
            }
        };
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                let _ = fs::create_dir_all(dir);
            }
        }
        if let Err(err) = fs::write(path, bytes) {
            warn!("failed to write cache snapshot {}: {err}", path.display());
        }
    }

    fn load(&mut self, path: &Path) {
        if !path.is_file() {
            return;
        }
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("failed to read cache snapshot {}: {err}", path.display());
                return;
            }
        };
        let pairs: Vec<(String, V)> = match serde_json::from_slice(&bytes) {
            Ok(pairs) => pairs,
            Err(err) => {
                warn!(
                    "failed to parse cache snapshot {}, starting cold: {err}",
                    path.display()
                );
                return;
            }
        };
        for (key, value) in pairs {
            self.set(key, value);
        }
        debug!(
            "loaded {} cache entries from {}",
            self.entries.len(),
            path.display()
        );
    }
}

impl<V> std::fmt::Debug for StoredLruCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredLruCache")
            .field("entries", &self.entries.len())
            .field("weight", &self.weight)
            .field("max_weight", &self.max_weight)
            .field("path", &self.path)
            .finish()
    }
}
