//! Tool handlers.
//!
//! Every handler returns a JSON payload, never an error: failures are
//! reported as `{"error": "..."}` inside the tool result so the client
//! sees them as ordinary text.

use chrono::{Duration, Local, NaiveDate};
use pricefeed_market_data::errors::MarketDataError;
use pricefeed_market_data::{
    normalize_symbol, AttemptOutcome, FetchDiagnostics, PriceCache, PriceRecord, PriceRequest,
    SourceRegistry,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::tools::{CLEAR_CACHE, GET_CACHE_STATS, GET_CURRENT_PRICE, GET_PRICES};

/// Days of history fetched to find the latest close.
const CURRENT_PRICE_LOOKBACK_DAYS: i64 = 5;

// ============================================================================
// Tool Arguments and Output
// ============================================================================

#[derive(Debug, Deserialize)]
struct GetPricesArgs {
    #[serde(default)]
    ticker: Option<String>,
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end: Option<String>,
    #[serde(default = "default_true")]
    adjusted: bool,
    #[serde(default = "default_true")]
    use_cache: bool,
}

#[derive(Debug, Default, Deserialize)]
struct TickerArgs {
    #[serde(default)]
    ticker: Option<String>,
}

fn default_true() -> bool {
    true
}

/// DTO for one record in tool output.
#[derive(Debug, Clone, Serialize)]
pub struct PriceRowDto {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub change: f64,
    pub change_percent: f64,
    pub ticker: String,
    pub source: String,
}

impl From<&PriceRecord> for PriceRowDto {
    fn from(record: &PriceRecord) -> Self {
        Self {
            date: record.date.format("%Y-%m-%d").to_string(),
            open: to_f64(record.open),
            high: to_f64(record.high),
            low: to_f64(record.low),
            close: to_f64(record.close),
            volume: record.volume,
            change: to_f64(record.change),
            change_percent: to_f64(record.change_percent),
            ticker: record.ticker.clone(),
            source: record.source.clone(),
        }
    }
}

/// One source tried while answering a request.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptDto {
    pub source: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub waited_secs: f64,
}

fn attempts(diagnostics: &FetchDiagnostics) -> Vec<AttemptDto> {
    diagnostics
        .attempts
        .iter()
        .map(|attempt| {
            let (status, records, error) = match &attempt.outcome {
                AttemptOutcome::Success { records } => ("success", Some(*records), None),
                AttemptOutcome::Empty => ("empty", None, None),
                AttemptOutcome::Failed { message } => ("error", None, Some(message.clone())),
            };
            AttemptDto {
                source: attempt.source_id.to_string(),
                status,
                records,
                error,
                waited_secs: attempt.waited_secs,
            }
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct PricesOutput {
    success: bool,
    ticker: String,
    source: String,
    records_count: usize,
    cached: bool,
    /// Sources tried for this answer; empty when served from cache
    attempts: Vec<AttemptDto>,
    data: Vec<PriceRowDto>,
}

#[derive(Debug, Serialize)]
struct CurrentPriceOutput {
    success: bool,
    ticker: String,
    source: String,
    date: String,
    price: f64,
    change: f64,
    change_percent: f64,
    attempts: Vec<AttemptDto>,
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

fn error_payload(message: impl Into<String>) -> Value {
    json!({ "error": message.into() })
}

fn to_payload<T: Serialize>(output: &T) -> Value {
    serde_json::to_value(output)
        .unwrap_or_else(|e| error_payload(format!("Internal server error: {}", e)))
}

fn parse_args<T: DeserializeOwned + Default>(arguments: Value) -> Result<T, String> {
    if arguments.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(arguments).map_err(|e| format!("Invalid arguments: {}", e))
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| format!("Invalid date '{}', expected YYYY-MM-DD", raw))
}

/// Message for a rejected request, without the error-kind prefix.
fn request_error(error: MarketDataError) -> String {
    match error {
        MarketDataError::InvalidRequest(message) => message,
        other => other.to_string(),
    }
}

/// Upper-cased, trimmed ticker, or `None` when missing or blank.
fn normalize_ticker(ticker: Option<String>) -> Option<String> {
    ticker
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
}

impl Default for GetPricesArgs {
    fn default() -> Self {
        Self {
            ticker: None,
            start: None,
            end: None,
            adjusted: true,
            use_cache: true,
        }
    }
}

// ============================================================================
// Service
// ============================================================================

/// Price tools over a source registry and a cache.
pub struct PriceService {
    registry: SourceRegistry,
    cache: PriceCache,
}

impl PriceService {
    pub fn new(registry: SourceRegistry, cache: PriceCache) -> Self {
        Self { registry, cache }
    }

    /// Dispatch a `tools/call` by tool name.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Value {
        match name {
            GET_PRICES => self.get_prices(arguments).await,
            GET_CURRENT_PRICE => self.get_current_price(arguments).await,
            GET_CACHE_STATS => self.cache_stats(),
            CLEAR_CACHE => self.clear_cache(arguments),
            other => error_payload(format!("Unknown tool: {}", other)),
        }
    }

    /// Historical prices for an inclusive date range.
    pub async fn get_prices(&self, arguments: Value) -> Value {
        let args: GetPricesArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(message) => return error_payload(message),
        };

        let Some(ticker) = normalize_ticker(args.ticker) else {
            return error_payload("Ticker symbol is required");
        };

        let (start, end) = match (args.start, args.end) {
            (Some(start), Some(end)) if !start.trim().is_empty() && !end.trim().is_empty() => {
                (start, end)
            }
            _ => return error_payload("Start and end dates are required"),
        };

        let request = match parse_date(&start)
            .and_then(|start| parse_date(&end).map(|end| (start, end)))
            .and_then(|(start, end)| {
                PriceRequest::new(&ticker, start, end, args.adjusted).map_err(request_error)
            }) {
            Ok(request) => request,
            Err(message) => return error_payload(message),
        };

        tracing::info!(
            "Fetching prices for {} from {} to {}",
            request.ticker,
            request.start,
            request.end
        );

        if args.use_cache {
            if let Some(records) = self.cache.get(&request.ticker, request.start, request.end) {
                let source = records
                    .first()
                    .map(|r| r.source.clone())
                    .unwrap_or_default();
                return to_payload(&PricesOutput {
                    success: true,
                    ticker: request.ticker,
                    source,
                    records_count: records.len(),
                    cached: true,
                    attempts: Vec::new(),
                    data: records.iter().map(PriceRowDto::from).collect(),
                });
            }
        }

        match self.registry.fetch_prices(&request).await {
            Ok(sourced) => {
                self.cache.save(&request.ticker, &sourced.records);
                to_payload(&PricesOutput {
                    success: true,
                    ticker: request.ticker,
                    source: sourced.source,
                    records_count: sourced.records.len(),
                    cached: false,
                    attempts: attempts(&sourced.diagnostics),
                    data: sourced.records.iter().map(PriceRowDto::from).collect(),
                })
            }
            Err(e) => fetch_error_payload(GET_PRICES, e),
        }
    }

    /// Most recent close over the last few days.
    pub async fn get_current_price(&self, arguments: Value) -> Value {
        let args: TickerArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(message) => return error_payload(message),
        };

        let Some(ticker) = normalize_ticker(args.ticker) else {
            return error_payload("Ticker symbol is required");
        };

        let end = Local::now().date_naive();
        let start = end - Duration::days(CURRENT_PRICE_LOOKBACK_DAYS);
        let request = match PriceRequest::new(&ticker, start, end, true) {
            Ok(request) => request,
            Err(e) => return error_payload(request_error(e)),
        };

        tracing::info!("Fetching current price for {}", request.ticker);

        match self.registry.fetch_prices(&request).await {
            Ok(sourced) => match sourced.latest() {
                Some(latest) => to_payload(&CurrentPriceOutput {
                    success: true,
                    ticker: request.ticker,
                    source: latest.source.clone(),
                    date: latest.date.format("%Y-%m-%d").to_string(),
                    price: to_f64(latest.close),
                    change: to_f64(latest.change),
                    change_percent: to_f64(latest.change_percent),
                    attempts: attempts(&sourced.diagnostics),
                }),
                None => error_payload(MarketDataError::AllSourcesFailed.to_string()),
            },
            Err(e) => fetch_error_payload(GET_CURRENT_PRICE, e),
        }
    }

    /// Cache contents and rate limiter usage.
    pub fn cache_stats(&self) -> Value {
        json!({
            "success": true,
            "cache": self.cache.stats(),
            "cache_expiry_hours": self.cache.expiry().as_secs() / 3600,
            "rate_limits": self.registry.rate_limiter().stats(),
        })
    }

    /// Clear one ticker, or everything when no ticker is given.
    pub fn clear_cache(&self, arguments: Value) -> Value {
        let args: TickerArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(message) => return error_payload(message),
        };

        let ticker = match normalize_ticker(args.ticker)
            .map(|t| normalize_symbol(&t))
            .transpose()
        {
            Ok(ticker) => ticker,
            Err(e) => return error_payload(request_error(e)),
        };
        let cleared = self.cache.clear(ticker.as_deref());

        json!({
            "success": true,
            "cleared": cleared,
            "ticker": ticker.unwrap_or_else(|| "all".to_string()),
        })
    }
}

/// Payload for a failed fetch.
fn fetch_error_payload(tool: &str, error: MarketDataError) -> Value {
    match error {
        MarketDataError::AllSourcesFailed => {
            error_payload(MarketDataError::AllSourcesFailed.to_string())
        }
        MarketDataError::InvalidRequest(message) => error_payload(message),
        other => {
            tracing::error!("Error in {}: {}", tool, other);
            error_payload(format!("Internal server error: {}", other))
        }
    }
}
