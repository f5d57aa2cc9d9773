//! CSV price table parsing for providers that answer with CSV.

use std::collections::HashMap;

use csv::{ReaderBuilder, StringRecord, Trim};
use log::debug;

use super::standardize::{parse_date, parse_decimal, parse_volume};
use super::RawBar;
use crate::errors::MarketDataError;

/// Header names accepted for the date column.
const DATE_COLUMNS: &[&str] = &["date", "timestamp"];

/// Column lookup by lower-cased header name.
struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_lowercase(), i))
            .collect();
        Self { index }
    }

    fn find(&self, names: &[&str]) -> Option<usize> {
        names.iter().find_map(|n| self.index.get(*n).copied())
    }

    fn cell<'r>(&self, row: &'r StringRecord, names: &[&str]) -> Option<&'r str> {
        self.find(names).and_then(|i| row.get(i))
    }
}

/// Parse a daily OHLCV CSV body.
///
/// `close_columns` lists the close column names in order of preference, so
/// callers can ask for an adjusted close and fall back to the raw one.
/// Rows whose date or close can't be parsed are skipped.
pub(crate) fn parse_price_csv(
    provider: &str,
    body: &str,
    close_columns: &[&str],
) -> Result<Vec<RawBar>, MarketDataError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| MarketDataError::parse(provider, format!("Failed to read CSV header: {}", e)))?
        .clone();
    let columns = Columns::from_headers(&headers);

    if columns.find(DATE_COLUMNS).is_none() || columns.find(close_columns).is_none() {
        return Err(MarketDataError::parse(
            provider,
            format!("Unexpected CSV header: {}", headers.iter().collect::<Vec<_>>().join(",")),
        ));
    }

    let mut bars = Vec::new();
    let mut skipped = 0usize;

    for row in reader.records() {
        let row = row.map_err(|e| MarketDataError::parse(provider, e.to_string()))?;

        let date = columns.cell(&row, DATE_COLUMNS).and_then(parse_date);
        let close = columns.cell(&row, close_columns).and_then(parse_decimal);

        match (date, close) {
            (Some(date), Some(close)) => bars.push(RawBar {
                date,
                open: columns.cell(&row, &["open"]).and_then(parse_decimal),
                high: columns.cell(&row, &["high"]).and_then(parse_decimal),
                low: columns.cell(&row, &["low"]).and_then(parse_decimal),
                close,
                volume: columns.cell(&row, &["volume"]).and_then(parse_volume),
            }),
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!("{}: skipped {} unparseable CSV rows", provider, skipped);
    }

    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_stooq_style_csv() {
        let body = "Date,Open,High,Low,Close,Volume\n\
                    2024-01-02,187.15,188.44,183.885,185.64,82488674\n\
                    2024-01-03,184.22,185.88,183.43,184.25,58414460\n";

        let bars = parse_price_csv("STOOQ", body, &["close"]).unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, dec!(185.64));
        assert_eq!(bars[0].low, Some(dec!(183.885)));
        assert_eq!(bars[1].volume, Some(58414460));
    }

    #[test]
    fn test_prefers_first_close_column() {
        let body = "timestamp,open,high,low,close,adjusted_close,volume\n\
                    2024-01-03,10,11,9,10.5,10.25,1000\n";

        let adjusted = parse_price_csv("ALPHA_VANTAGE", body, &["adjusted_close", "close"]).unwrap();
        assert_eq!(adjusted[0].close, dec!(10.25));

        let raw = parse_price_csv("ALPHA_VANTAGE", body, &["close"]).unwrap();
        assert_eq!(raw[0].close, dec!(10.5));
    }

    #[test]
    fn test_missing_volume_column_is_none() {
        let body = "Date,Open,High,Low,Close\n2024-01-02,1,2,0.5,1.5\n";
        let bars = parse_price_csv("STOOQ", body, &["close"]).unwrap();
        assert_eq!(bars[0].volume, None);
    }

    #[test]
    fn test_skips_bad_rows() {
        let body = "Date,Close\nnot-a-date,1\n2024-01-02,\n2024-01-03,2\n";
        let bars = parse_price_csv("STOOQ", body, &["close"]).unwrap();
        assert_eq!(bars.len(), 1);
    }

    #[test]
    fn test_rejects_unexpected_header() {
        let err = parse_price_csv("STOOQ", "No data\n", &["close"]).unwrap_err();
        assert!(matches!(err, MarketDataError::Parse { .. }));
    }
}
