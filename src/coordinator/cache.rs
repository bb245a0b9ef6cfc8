//! Translation-unit cache
//!
//! One entry per file identity. Entries are created on the first successful
//! parse, replaced (never mutated) on reparse, and all dropped on reset.
//! Units are shared with readers through `Arc`, so a reader holding a unit
//! keeps seeing the version it fetched while a replacement is installed.
//!
//! The cache itself is not synchronized; the coordinator keeps it inside its
//! state lock.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use super::serial::SerialId;

/// A cached unit with coordinator metadata
#[derive(Debug)]
pub struct CacheEntry<U> {
    /// The parse result
    pub unit: Arc<U>,
    /// Stamp of the parse cycle that produced the unit
    pub parsed_at: SerialId,
    /// When the unit was installed
    pub last_updated: Instant,
}

impl<U> CacheEntry<U> {
    /// Create a new cache entry
    pub fn new(unit: U, parsed_at: SerialId) -> Self {
        Self {
            unit: Arc::new(unit),
            parsed_at,
            last_updated: Instant::now(),
        }
    }
}

/// Map from file identity to cached unit
#[derive(Debug)]
pub struct UnitCache<U> {
    entries: HashMap<PathBuf, CacheEntry<U>>,
}

impl<U> UnitCache<U> {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Get a cached entry if it exists
    pub fn get(&self, path: &Path) -> Option<&CacheEntry<U>> {
        self.entries.get(path)
    }

    /// Get a shared handle to a cached unit
    pub fn unit(&self, path: &Path) -> Option<Arc<U>> {
        self.entries.get(path).map(|entry| Arc::clone(&entry.unit))
    }

    /// Check if a file is cached
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Install a unit, returning the entry it replaced
    pub fn install(&mut self, path: PathBuf, unit: U, parsed_at: SerialId) -> Option<CacheEntry<U>> {
        self.entries.insert(path, CacheEntry::new(unit, parsed_at))
    }

    /// Get the number of cached files
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached file identities, sorted
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self.entries.keys().cloned().collect();
        files.sort();
        files
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let oldest = self.entries.values().map(|e| e.last_updated).min();
        CacheStats {
            file_count: self.entries.len(),
            shared_units: self
                .entries
                .values()
                .filter(|e| Arc::strong_count(&e.unit) > 1)
                .count(),
            oldest_update: oldest,
        }
    }
}

impl<U> Default for UnitCache<U> {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the unit cache
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of files in cache
    pub file_count: usize,
    /// Units currently also held by a reader
    pub shared_units: usize,
    /// Install time of the least recently updated entry
    pub oldest_update: Option<Instant>,
}
