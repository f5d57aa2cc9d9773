//! Pricefeed Market Data Crate
//!
//! Daily price history retrieval from several free providers, with
//! per-provider rate limiting, fixed-order fallback and an on-disk cache.
//!
//! # Architecture
//!
//! ```text
//!  PriceRequest
//!       |
//!       v
//! +------------------+     +------------------+
//! |  SourceRegistry  | --> |   RateLimiter    |  (sliding 60s window per source)
//! +------------------+     +------------------+
//!       |
//!       v   tried in priority order until one returns rows
//! +------------------+
//! |   PriceSource    |  (Stooq, Alpha Vantage, Yahoo Finance)
//! +------------------+
//!       |
//!       v   standardize()
//! +------------------+     +------------------+
//! |   PriceRecord    | --> |    PriceCache    |  (PriceStore: CSV files / memory)
//! +------------------+     +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`PriceRecord`] - One normalized trading day for a ticker
//! - [`PriceRequest`] - Ticker plus inclusive date range
//! - [`PriceSource`] - Provider adapter contract
//! - [`SourceRegistry`] - Fallback orchestration
//! - [`PriceCache`] - Merge/expiry logic over a [`PriceStore`]

pub mod cache;
pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;

pub use models::{normalize_symbol, PriceRecord, PriceRequest, ProviderId, SourcedPrices};

pub use provider::alpha_vantage::AlphaVantageProvider;
pub use provider::stooq::StooqProvider;
pub use provider::yahoo::YahooProvider;
pub use provider::{standardize, PriceSource, RateLimit, RawBar};

pub use registry::{
    AttemptOutcome, FetchDiagnostics, RateLimiter, SourceAttempt, SourceRegistry, WindowStats,
};

pub use cache::{CacheStats, CsvFileStore, MemoryStore, PriceCache, PriceStore};
