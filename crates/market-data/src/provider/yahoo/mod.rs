//! Yahoo Finance price source.
//!
//! Uses the chart API through `yahoo_finance_api`. The API treats the end of
//! a range as exclusive, so requests are widened by one day and trimmed back
//! to the inclusive range afterwards.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use log::{debug, warn};
use rust_decimal::Decimal;
use time::OffsetDateTime;
use yahoo_finance_api as yahoo;

use crate::errors::MarketDataError;
use crate::models::{PriceRecord, PriceRequest};
use crate::provider::{standardize, PriceSource, RateLimit, RawBar};

const PROVIDER_ID: &str = "YAHOO";
const DISPLAY_NAME: &str = "Yahoo Finance";

/// Yahoo Finance daily history source.
pub struct YahooProvider {
    connector: yahoo::YahooConnector,
    timeout: Duration,
}

impl YahooProvider {
    /// Create a Yahoo Finance source with the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self, MarketDataError> {
        let connector = yahoo::YahooConnector::new().map_err(|e| {
            MarketDataError::provider(
                PROVIDER_ID,
                format!("Failed to initialize Yahoo connector: {}", e),
            )
        })?;
        Ok(Self { connector, timeout })
    }

    /// Convert a date to the start of that day in UTC.
    fn day_start(date: NaiveDate) -> OffsetDateTime {
        let seconds = date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or_default();
        OffsetDateTime::from_unix_timestamp(seconds).unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }

    /// Bounds to send to Yahoo for an inclusive date range.
    fn query_range(start: NaiveDate, end: NaiveDate) -> (OffsetDateTime, OffsetDateTime) {
        let end_exclusive = end.succ_opt().unwrap_or(end);
        (Self::day_start(start), Self::day_start(end_exclusive))
    }

    /// Convert a Yahoo quote to a raw bar.
    ///
    /// Returns `None` for rows with an unusable timestamp or close (Yahoo
    /// pads halted sessions with NaN).
    fn quote_to_bar(quote: &yahoo::Quote, adjusted: bool) -> Option<RawBar> {
        let date = Utc
            .timestamp_opt(quote.timestamp as i64, 0)
            .single()?
            .date_naive();

        let close_value = if adjusted { quote.adjclose } else { quote.close };
        let close = Decimal::from_f64_retain(close_value)?;

        Some(RawBar {
            date,
            open: Decimal::from_f64_retain(quote.open),
            high: Decimal::from_f64_retain(quote.high),
            low: Decimal::from_f64_retain(quote.low),
            close,
            volume: Some(quote.volume as u64),
        })
    }

    fn map_error(symbol: &str, e: yahoo::YahooError) -> MarketDataError {
        match e {
            yahoo::YahooError::NoQuotes => MarketDataError::NoDataForRange,
            yahoo::YahooError::NoResult => MarketDataError::SymbolNotFound(symbol.to_string()),
            other => MarketDataError::provider(PROVIDER_ID, other.to_string()),
        }
    }

    /// Normalize quotes, keeping the ones inside the requested range.
    fn to_records(request: &PriceRequest, quotes: &[yahoo::Quote]) -> Vec<PriceRecord> {
        let mut skipped = 0usize;
        let bars: Vec<RawBar> = quotes
            .iter()
            .filter_map(|q| {
                let bar = Self::quote_to_bar(q, request.adjusted);
                if bar.is_none() {
                    skipped += 1;
                }
                bar
            })
            .filter(|bar| bar.date >= request.start && bar.date <= request.end)
            .collect();

        if skipped > 0 {
            warn!("Yahoo: skipped {} unusable quotes for {}", skipped, request.ticker);
        }

        standardize(&request.ticker, DISPLAY_NAME, bars)
    }
}

#[async_trait]
impl PriceSource for YahooProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn display_name(&self) -> &'static str {
        DISPLAY_NAME
    }

    fn priority(&self) -> u8 {
        3
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::per_minute(30)
    }

    async fn fetch_prices(
        &self,
        request: &PriceRequest,
    ) -> Result<Vec<PriceRecord>, MarketDataError> {
        let symbol = request.ticker.as_str();
        let (start_time, end_time) = Self::query_range(request.start, request.end);

        debug!(
            "Fetching historical quotes for {} from {} to {} from Yahoo",
            symbol, request.start, request.end
        );

        let response = tokio::time::timeout(
            self.timeout,
            self.connector.get_quote_history(symbol, start_time, end_time),
        )
        .await
        .map_err(|_| MarketDataError::Timeout {
            provider: PROVIDER_ID.to_string(),
        })?
        .map_err(|e| Self::map_error(symbol, e))?;

        let quotes = match response.quotes() {
            Ok(quotes) => quotes,
            Err(yahoo::YahooError::NoQuotes) => {
                debug!(
                    "No historical quotes returned for '{}' between {} and {}",
                    symbol, request.start, request.end
                );
                return Ok(Vec::new());
            }
            Err(e) => return Err(Self::map_error(symbol, e)),
        };

        Ok(Self::to_records(request, &quotes))
    }
}
