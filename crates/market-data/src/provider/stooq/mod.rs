//! Stooq price source.
//!
//! Stooq serves free daily history as CSV with no API key. It is the most
//! permissive of the sources and sits first in the fallback order.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;

use super::csv_table::parse_price_csv;
use crate::errors::MarketDataError;
use crate::models::{PriceRecord, PriceRequest};
use crate::provider::{standardize, PriceSource, RateLimit};

const BASE_URL: &str = "https://stooq.com/q/d/l/";
const PROVIDER_ID: &str = "STOOQ";
const DISPLAY_NAME: &str = "Stooq";

/// Stooq daily CSV source.
pub struct StooqProvider {
    client: Client,
    base_url: String,
}

impl StooqProvider {
    /// Create a Stooq source with the given HTTP timeout.
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the source at a different endpoint (mirrors, local fixtures).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Stooq symbol for a ticker.
    ///
    /// Stooq wants lower-case symbols with a market suffix; bare tickers are
    /// assumed to be US listings. Indices (`^spx`) and already-suffixed
    /// symbols (`vod.uk`) pass through.
    fn stooq_symbol(ticker: &str) -> String {
        let symbol = ticker.trim().to_lowercase();
        if symbol.starts_with('^') || symbol.contains('.') {
            symbol
        } else {
            format!("{}.us", symbol)
        }
    }

    fn build_url(&self, request: &PriceRequest) -> Result<reqwest::Url, MarketDataError> {
        let symbol = Self::stooq_symbol(&request.ticker);
        let d1 = request.start.format("%Y%m%d").to_string();
        let d2 = request.end.format("%Y%m%d").to_string();

        reqwest::Url::parse_with_params(
            &self.base_url,
            &[
                ("s", symbol.as_str()),
                ("d1", d1.as_str()),
                ("d2", d2.as_str()),
                ("i", "d"),
            ],
        )
        .map_err(|e| MarketDataError::provider(PROVIDER_ID, format!("Failed to build URL: {}", e)))
    }

    /// Make the request and return the raw body.
    async fn fetch(&self, url: reqwest::Url) -> Result<String, MarketDataError> {
        debug!("Stooq request: {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout {
                    provider: PROVIDER_ID.to_string(),
                }
            } else {
                MarketDataError::provider(PROVIDER_ID, e.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }
        if !status.is_success() {
            warn!("Stooq returned status {}", status);
            return Err(MarketDataError::provider(PROVIDER_ID, format!("HTTP {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| MarketDataError::provider(PROVIDER_ID, e.to_string()))
    }

    /// Turn a Stooq CSV body into records.
    fn parse_body(ticker: &str, body: &str) -> Result<Vec<PriceRecord>, MarketDataError> {
        let trimmed = body.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("no data") {
            return Ok(Vec::new());
        }
        if trimmed.contains("Exceeded the daily hits limit") {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        let bars = parse_price_csv(PROVIDER_ID, trimmed, &["close"])?;
        Ok(standardize(ticker, DISPLAY_NAME, bars))
    }
}

#[async_trait]
impl PriceSource for StooqProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn display_name(&self) -> &'static str {
        DISPLAY_NAME
    }

    fn priority(&self) -> u8 {
        1
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::per_minute(60)
    }

    async fn fetch_prices(
        &self,
        request: &PriceRequest,
    ) -> Result<Vec<PriceRecord>, MarketDataError> {
        let url = self.build_url(request)?;
        let body = self.fetch(url).await?;
        let records = Self::parse_body(&request.ticker, &body)?;

        debug!(
            "Stooq: fetched {} records for {}",
            records.len(),
            request.ticker
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn request() -> PriceRequest {
        PriceRequest::new(
            "AAPL",
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            true,
        )
        .unwrap()
    }

    #[test]
    fn test_stooq_symbol() {
        assert_eq!(StooqProvider::stooq_symbol("AAPL"), "aapl.us");
        assert_eq!(StooqProvider::stooq_symbol("VOD.UK"), "vod.uk");
        assert_eq!(StooqProvider::stooq_symbol("^SPX"), "^spx");
    }

    #[test]
    fn test_build_url() {
        let provider = StooqProvider::new(Duration::from_secs(5));
        let url = provider.build_url(&request()).unwrap();
        assert_eq!(
            url.as_str(),
            "https://stooq.com/q/d/l/?s=aapl.us&d1=20240102&d2=20240105&i=d"
        );
    }

    #[test]
    fn test_parse_body() {
        let body = "Date,Open,High,Low,Close,Volume\n\
                    2024-01-02,187.15,188.44,183.885,185.64,82488674\n\
                    2024-01-03,184.22,185.88,183.43,184.25,58414460\n";

        let records = StooqProvider::parse_body("AAPL", body).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].source, "Stooq");
        assert_eq!(records[1].change, dec!(-1.39));
    }

    #[test]
    fn test_no_data_body_is_empty() {
        assert!(StooqProvider::parse_body("AAPL", "No data").unwrap().is_empty());
        assert!(StooqProvider::parse_body("AAPL", "").unwrap().is_empty());
    }

    #[test]
    fn test_daily_limit_is_rate_limited() {
        let err = StooqProvider::parse_body("AAPL", "Exceeded the daily hits limit").unwrap_err();
        assert!(matches!(err, MarketDataError::RateLimited { .. }));
    }

    #[test]
    fn test_identity() {
        let provider = StooqProvider::new(Duration::from_secs(5));
        assert_eq!(provider.id(), "STOOQ");
        assert_eq!(provider.priority(), 1);
        assert_eq!(provider.rate_limit().requests_per_minute, 60);
    }
}
