//! Per-ticker price cache.
//!
//! [`PriceCache`] holds the cache rules (expiry, range filtering, merge on
//! save) on top of a [`PriceStore`], which only knows how to persist one
//! record set per ticker. Store failures never escape the cache: a failed
//! read is a miss and a failed write is logged.

mod csv_store;
mod memory;
mod store;

pub use csv_store::CsvFileStore;
pub use memory::MemoryStore;
pub use store::{CacheStats, PriceStore, StoredEntry};

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{Days, NaiveDate};
use log::{debug, info, warn};

use crate::models::PriceRecord;

/// Entries older than this are treated as missing.
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(24 * 60 * 60);

/// Slack allowed between a range edge and the nearest cached row. Covers a
/// weekend next to a market holiday.
const EDGE_TOLERANCE: Days = Days::new(4);

pub struct PriceCache {
    store: Arc<dyn PriceStore>,
    expiry: Duration,
}

impl PriceCache {
    pub fn new(store: Arc<dyn PriceStore>, expiry: Duration) -> Self {
        Self { store, expiry }
    }

    /// Cache backed by CSV files in `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>, expiry: Duration) -> Self {
        Self::new(Arc::new(CsvFileStore::new(dir)), expiry)
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    /// Cached records for `ticker` with `start <= date <= end`.
    ///
    /// Only a hit when the cached rows span the whole range: the first row
    /// falls within a few days of `start` and the last within a few days of
    /// `end`. Anything narrower is a miss so the caller refetches instead of
    /// answering with a fragment. Absent, stale and unreadable entries are
    /// misses too.
    pub fn get(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Option<Vec<PriceRecord>> {
        let ticker = ticker.trim().to_uppercase();

        let entry = match self.store.load(&ticker) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!("Cache miss for {}", ticker);
                return None;
            }
            Err(e) => {
                warn!("Failed to read cache for {}: {}", ticker, e);
                return None;
            }
        };

        // A modification time in the future counts as fresh
        let age = SystemTime::now()
            .duration_since(entry.modified)
            .unwrap_or(Duration::ZERO);
        if age >= self.expiry {
            debug!("Cache for {} is stale ({}s old)", ticker, age.as_secs());
            return None;
        }

        let records: Vec<PriceRecord> = entry
            .records
            .into_iter()
            .filter(|r| r.within(start, end))
            .collect();

        let (Some(first), Some(last)) = (records.first(), records.last()) else {
            debug!("Cache for {} has no rows between {} and {}", ticker, start, end);
            return None;
        };

        let latest_first = start.checked_add_days(EDGE_TOLERANCE).unwrap_or(NaiveDate::MAX);
        let earliest_last = end.checked_sub_days(EDGE_TOLERANCE).unwrap_or(NaiveDate::MIN);
        if first.date > latest_first || last.date < earliest_last {
            debug!(
                "Cache for {} only spans {} to {}, requested {} to {}",
                ticker, first.date, last.date, start, end
            );
            return None;
        }

        info!("Loaded {} records for {} from cache", records.len(), ticker);
        Some(records)
    }

    /// Merge `records` into the cached entry for `ticker`.
    ///
    /// Rows are keyed by date; a new row replaces a cached row with the same
    /// date. The stored entry is sorted ascending.
    pub fn save(&self, ticker: &str, records: &[PriceRecord]) {
        if records.is_empty() {
            return;
        }
        let ticker = ticker.trim().to_uppercase();

        let existing = match self.store.load(&ticker) {
            Ok(entry) => entry.map(|e| e.records).unwrap_or_default(),
            Err(e) => {
                warn!("Replacing unreadable cache for {}: {}", ticker, e);
                Vec::new()
            }
        };

        let mut by_date: BTreeMap<NaiveDate, PriceRecord> = BTreeMap::new();
        for record in existing.into_iter().chain(records.iter().cloned()) {
            by_date.insert(record.date, record);
        }
        let merged: Vec<PriceRecord> = by_date.into_values().collect();

        match self.store.write(&ticker, &merged) {
            Ok(()) => info!("Cached {} records for {}", merged.len(), ticker),
            Err(e) => warn!("Failed to write cache for {}: {}", ticker, e),
        }
    }

    /// Remove one ticker's entry, or every entry when `ticker` is `None`.
    ///
    /// Returns the number of entries removed.
    pub fn clear(&self, ticker: Option<&str>) -> usize {
        let result = match ticker {
            Some(t) => self.store.remove(&t.trim().to_uppercase()).map(usize::from),
            None => self.store.remove_all(),
        };

        match result {
            Ok(count) => {
                info!(
                    "Cleared {} cache entries ({})",
                    count,
                    ticker.unwrap_or("all tickers")
                );
                count
            }
            Err(e) => {
                warn!("Failed to clear cache: {}", e);
                0
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.store.stats().unwrap_or_else(|e| {
            warn!("Failed to read cache stats: {}", e);
            CacheStats::default()
        })
    }
}
