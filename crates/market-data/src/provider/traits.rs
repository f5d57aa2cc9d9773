//! Price source trait definition.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{PriceRecord, PriceRequest};

use super::capabilities::RateLimit;

/// Trait for historical price sources.
///
/// Implement this trait to add a new provider. The registry orders sources
/// by [`priority`](Self::priority), rate-limits them by [`id`](Self::id) and
/// falls through to the next source when one returns nothing.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use pricefeed_market_data::{PriceRecord, PriceRequest, PriceSource, RateLimit};
/// use pricefeed_market_data::errors::MarketDataError;
///
/// struct MySource;
///
/// #[async_trait]
/// impl PriceSource for MySource {
///     fn id(&self) -> &'static str {
///         "MY_SOURCE"
///     }
///
///     fn display_name(&self) -> &'static str {
///         "My Source"
///     }
///
///     fn rate_limit(&self) -> RateLimit {
///         RateLimit::per_minute(10)
///     }
///
///     async fn fetch_prices(
///         &self,
///         request: &PriceRequest,
///     ) -> Result<Vec<PriceRecord>, MarketDataError> {
///         // ... call the provider, then standardize()
///     }
/// }
/// ```
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Stable identifier used as the rate limiter key ("STOOQ", "YAHOO", ...).
    fn id(&self) -> &'static str;

    /// Human-readable provenance written into each record's `source` field.
    fn display_name(&self) -> &'static str;

    /// Position in the fallback order. Lower values are tried first.
    fn priority(&self) -> u8 {
        10
    }

    /// Calls-per-minute quota for this source.
    fn rate_limit(&self) -> RateLimit;

    /// Fetch daily prices for `request.ticker` in `[request.start, request.end]`.
    ///
    /// Returns records sorted ascending by date. An empty vector means the
    /// source had nothing for this range.
    async fn fetch_prices(&self, request: &PriceRequest)
        -> Result<Vec<PriceRecord>, MarketDataError>;
}
