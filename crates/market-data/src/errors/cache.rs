use thiserror::Error;

/// Errors raised by a [`PriceStore`](crate::cache::PriceStore).
///
/// [`PriceCache`](crate::cache::PriceCache) never lets these reach a
/// request: reads degrade to a miss, writes are logged and dropped.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The ticker doesn't map to a plain file name inside the cache directory.
    #[error("Invalid cache key: {0}")]
    InvalidTicker(String),

    /// The entry exists but a row could not be decoded.
    #[error("Corrupt cache entry for {ticker}: {message}")]
    Corrupt { ticker: String, message: String },
}
