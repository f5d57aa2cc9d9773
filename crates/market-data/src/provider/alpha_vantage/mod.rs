//! Alpha Vantage price source.
//!
//! Uses the TIME_SERIES_DAILY(_ADJUSTED) endpoints with `datatype=csv`.
//! Errors and throttling notices come back as small JSON documents (or as a
//! "Thank you for using Alpha Vantage" text) with a 200 status.
//!
//! Note: Alpha Vantage free tier is limited to 5 API calls per minute.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;

use super::csv_table::parse_price_csv;
use crate::errors::MarketDataError;
use crate::models::{PriceRecord, PriceRequest};
use crate::provider::{standardize, PriceSource, RateLimit};

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER_ID: &str = "ALPHA_VANTAGE";
const DISPLAY_NAME: &str = "Alpha Vantage";

/// Substrings Alpha Vantage uses when a key runs out of quota.
const THROTTLE_MARKERS: &[&str] = &[
    "Thank you for using Alpha Vantage",
    "API call frequency",
    "rate limit",
];

/// Alpha Vantage daily series source.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

/// JSON body returned instead of CSV when something is wrong.
#[derive(Debug, Default, Deserialize)]
struct NoticeBody {
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

impl AlphaVantageProvider {
    /// Create an Alpha Vantage source with the given API key and HTTP timeout.
    pub fn new(api_key: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the source at a different endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn function_for(adjusted: bool) -> &'static str {
        if adjusted {
            "TIME_SERIES_DAILY_ADJUSTED"
        } else {
            "TIME_SERIES_DAILY"
        }
    }

    /// Make a request to the Alpha Vantage API.
    async fn fetch(&self, params: &[(&str, &str)]) -> Result<String, MarketDataError> {
        let mut all_params: Vec<(&str, &str)> = params.to_vec();
        all_params.push(("apikey", &self.api_key));

        let url = reqwest::Url::parse_with_params(&self.base_url, &all_params).map_err(|e| {
            MarketDataError::provider(PROVIDER_ID, format!("Failed to build URL: {}", e))
        })?;

        debug!(
            "Alpha Vantage request: {}",
            url.as_str().replace(&self.api_key, "***")
        );

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
            warn!("Alpha Vantage returned status {}", status);
            return Err(MarketDataError::provider(PROVIDER_ID, format!("HTTP {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| MarketDataError::provider(PROVIDER_ID, e.to_string()))
    }

    /// Map an API notice to an error.
    fn check_api_error(notice: NoticeBody) -> MarketDataError {
        if let Some(msg) = notice.error_message {
            if msg.contains("Invalid API call") || msg.contains("not found") {
                return MarketDataError::SymbolNotFound(msg);
            }
            return MarketDataError::provider(PROVIDER_ID, msg);
        }

        // "Note" and "Information" both carry throttling and premium notices
        for msg in [notice.note, notice.information].into_iter().flatten() {
            if THROTTLE_MARKERS.iter().any(|m| msg.contains(m)) {
                return MarketDataError::RateLimited {
                    provider: PROVIDER_ID.to_string(),
                };
            }
            warn!("Alpha Vantage notice: {}", msg);
            return MarketDataError::provider(PROVIDER_ID, msg);
        }

        MarketDataError::parse(PROVIDER_ID, "Unexpected JSON response")
    }

    /// Turn a response body into records within the requested range.
    fn parse_body(request: &PriceRequest, body: &str) -> Result<Vec<PriceRecord>, MarketDataError> {
        let trimmed = body.trim();

        if trimmed.starts_with('{') {
            let notice: NoticeBody = serde_json::from_str(trimmed).map_err(|e| {
                MarketDataError::parse(PROVIDER_ID, format!("Failed to parse response: {}", e))
            })?;
            return Err(Self::check_api_error(notice));
        }

        if THROTTLE_MARKERS.iter().any(|m| trimmed.contains(m)) {
            warn!("Alpha Vantage API limit reached");
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        let close_columns: &[&str] = if request.adjusted {
            &["adjusted_close", "close"]
        } else {
            &["close"]
        };

        // Full output covers the whole history, newest first
        let bars = parse_price_csv(PROVIDER_ID, trimmed, close_columns)?
            .into_iter()
            .filter(|bar| bar.date >= request.start && bar.date <= request.end)
            .collect();

        Ok(standardize(&request.ticker, DISPLAY_NAME, bars))
    }
}

#[async_trait]
impl PriceSource for AlphaVantageProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn display_name(&self) -> &'static str {
        DISPLAY_NAME
    }

    fn priority(&self) -> u8 {
        // Behind Stooq due to rate limits
        2
    }

    fn rate_limit(&self) -> RateLimit {
        // Free tier is very limited
        RateLimit::per_minute(5)
    }

    async fn fetch_prices(
        &self,
        request: &PriceRequest,
    ) -> Result<Vec<PriceRecord>, MarketDataError> {
        let params = [
            ("function", Self::function_for(request.adjusted)),
            ("symbol", request.ticker.as_str()),
            ("outputsize", "full"),
            ("datatype", "csv"),
        ];

        let body = self.fetch(&params).await?;
        let records = Self::parse_body(request, &body)?;

        debug!(
            "Alpha Vantage: fetched {} records for {}",
            records.len(),
            request.ticker
        );
        Ok(records)
    }
}
