use chrono::NaiveDate;

use super::PriceRecord;
use crate::errors::MarketDataError;
use crate::registry::FetchDiagnostics;

/// Parameters for a price history fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriceRequest {
    /// Upper-cased ticker symbol
    pub ticker: String,
    /// First day of the range (inclusive)
    pub start: NaiveDate,
    /// Last day of the range (inclusive)
    pub end: NaiveDate,
    /// Prefer split/dividend adjusted closes where the provider has them
    pub adjusted: bool,
}

/// Trimmed, upper-cased ticker symbol.
///
/// Symbols double as cache file names, so anything that could leave the cache
/// directory (path separators, `..`, control characters) is rejected.
pub fn normalize_symbol(raw: &str) -> Result<String, MarketDataError> {
    let ticker = raw.trim().to_uppercase();
    if ticker.is_empty() {
        return Err(MarketDataError::InvalidRequest(
            "Ticker symbol is required".to_string(),
        ));
    }

    let unsafe_char = |c: char| c == '/' || c == '\\' || c.is_control();
    if ticker == "." || ticker.contains("..") || ticker.chars().any(unsafe_char) {
        return Err(MarketDataError::InvalidRequest(format!(
            "Invalid ticker symbol: {}",
            raw.trim()
        )));
    }

    Ok(ticker)
}

impl PriceRequest {
    /// Build a request, normalizing the ticker and checking the range.
    pub fn new(
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
        adjusted: bool,
    ) -> Result<Self, MarketDataError> {
        let ticker = normalize_symbol(ticker)?;
        if start > end {
            return Err(MarketDataError::InvalidRequest(format!(
                "Start date {} is after end date {}",
                start, end
            )));
        }

        Ok(Self {
            ticker,
            start,
            end,
            adjusted,
        })
    }
}

/// Records returned by the first source that had data, plus the trail of
/// attempts that led there.
#[derive(Clone, Debug)]
pub struct SourcedPrices {
    /// Display name of the source that answered
    pub source: String,
    /// Records sorted ascending by date
    pub records: Vec<PriceRecord>,
    /// Every source tried, in order, ending with the one that answered
    pub diagnostics: FetchDiagnostics,
}

impl SourcedPrices {
    /// Most recent record, if any.
    pub fn latest(&self) -> Option<&PriceRecord> {
        self.records.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_request_uppercases_ticker() {
        let request = PriceRequest::new(" msft ", day(1), day(5), true).unwrap();
        assert_eq!(request.ticker, "MSFT");
        assert!(request.adjusted);
    }

    #[test]
    fn test_request_rejects_empty_ticker() {
        let err = PriceRequest::new("  ", day(1), day(5), true).unwrap_err();
        assert_eq!(err.to_string(), "Invalid request: Ticker symbol is required");
    }

    #[test]
    fn test_request_rejects_path_like_tickers() {
        for raw in ["../outside", "a/b", "..\\evil", "AAPL\0", ".", "x..y"] {
            let err = PriceRequest::new(raw, day(1), day(5), true).unwrap_err();
            assert!(
                err.to_string().contains("Invalid ticker symbol"),
                "{raw:?} gave {err}"
            );
        }
    }

    #[test]
    fn test_normalize_symbol_keeps_index_and_class_symbols() {
        assert_eq!(normalize_symbol(" ^spx ").unwrap(), "^SPX");
        assert_eq!(normalize_symbol("brk.b").unwrap(), "BRK.B");
    }

    #[test]
    fn test_request_rejects_inverted_range() {
        assert!(PriceRequest::new("AAPL", day(5), day(1), false).is_err());
        assert!(PriceRequest::new("AAPL", day(3), day(3), false).is_ok());
    }
}
