//! In-process store, used by tests and when no cache directory is wanted.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

use log::warn;

use super::store::{CacheStats, PriceStore, StoredEntry};
use crate::errors::CacheError;
use crate::models::PriceRecord;

/// Store keeping entries in a map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, StoredEntry>> {
        self.entries.read().unwrap_or_else(|poisoned| {
            warn!("Memory store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, HashMap<String, StoredEntry>> {
        self.entries.write().unwrap_or_else(|poisoned| {
            warn!("Memory store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Insert an entry with an explicit modification time.
    pub fn insert_at(&self, ticker: &str, records: Vec<PriceRecord>, modified: SystemTime) {
        self.write_guard()
            .insert(ticker.trim().to_uppercase(), StoredEntry { records, modified });
    }
}

impl PriceStore for MemoryStore {
    fn load(&self, ticker: &str) -> Result<Option<StoredEntry>, CacheError> {
        Ok(self.read().get(&ticker.trim().to_uppercase()).cloned())
    }

    fn write(&self, ticker: &str, records: &[PriceRecord]) -> Result<(), CacheError> {
        self.insert_at(ticker, records.to_vec(), SystemTime::now());
        Ok(())
    }

    fn remove(&self, ticker: &str) -> Result<bool, CacheError> {
        Ok(self
            .write_guard()
            .remove(&ticker.trim().to_uppercase())
            .is_some())
    }

    fn remove_all(&self) -> Result<usize, CacheError> {
        let mut entries = self.write_guard();
        let count = entries.len();
        entries.clear();
        Ok(count)
    }

    fn stats(&self) -> Result<CacheStats, CacheError> {
        let entries = self.read();
        let mut files: Vec<String> = entries.keys().cloned().collect();
        files.sort();

        Ok(CacheStats {
            total_files: entries.len(),
            total_size_mb: 0.0,
            cache_dir: "memory".to_string(),
            files,
        })
    }
}
