//! Storage abstraction behind the price cache.

use std::time::SystemTime;

use serde::Serialize;

use crate::errors::CacheError;
use crate::models::PriceRecord;

/// One ticker's cached records plus when they were last written.
#[derive(Clone, Debug)]
pub struct StoredEntry {
    /// Records sorted ascending by date
    pub records: Vec<PriceRecord>,
    pub modified: SystemTime,
}

/// Summary of what a store holds.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub total_files: usize,
    pub total_size_mb: f64,
    /// Directory (or other location description) of the store
    pub cache_dir: String,
    /// Cached tickers, sorted
    pub files: Vec<String>,
}

/// Key-value store of ticker -> ordered record set.
///
/// Keys are upper-cased tickers. Implementations overwrite whole entries;
/// merging happens in [`PriceCache`](super::PriceCache).
pub trait PriceStore: Send + Sync {
    /// Load an entry, or `None` if the ticker has never been written.
    fn load(&self, ticker: &str) -> Result<Option<StoredEntry>, CacheError>;

    /// Replace the entry for `ticker` with `records`.
    fn write(&self, ticker: &str, records: &[PriceRecord]) -> Result<(), CacheError>;

    /// Delete one entry. Returns whether anything was removed.
    fn remove(&self, ticker: &str) -> Result<bool, CacheError>;

    /// Delete every entry. Returns how many were removed.
    fn remove_all(&self) -> Result<usize, CacheError>;

    fn stats(&self) -> Result<CacheStats, CacheError>;
}
