use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One trading day of price history for a ticker.
///
/// Every adapter produces these through [`crate::provider::standardize`],
/// so records from different providers are interchangeable in the cache.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    /// Trading day (serialized as `YYYY-MM-DD`)
    pub date: NaiveDate,

    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,

    /// Shares traded; zero when the provider has no volume column
    pub volume: u64,

    /// Close minus previous close
    pub change: Decimal,

    /// Change relative to previous close, in percent
    pub change_percent: Decimal,

    /// Upper-cased ticker symbol
    pub ticker: String,

    /// Provenance tag (provider display name)
    pub source: String,
}

impl PriceRecord {
    /// Whether this record falls inside the inclusive `[start, end]` range.
    pub fn within(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.date >= start && self.date <= end
    }
}
