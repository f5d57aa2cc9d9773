//! Normalization shared by every adapter.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;
use num_traits::ToPrimitive;
use rust_decimal::Decimal;

use crate::models::PriceRecord;

/// Decimal places kept for `change_percent`.
const PERCENT_SCALE: u32 = 4;

/// One provider row before normalization.
///
/// Columns the provider doesn't deliver stay `None` and are backfilled with
/// zero by [`standardize`].
#[derive(Clone, Debug, PartialEq)]
pub struct RawBar {
    pub date: NaiveDate,
    pub open: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub close: Decimal,
    pub volume: Option<u64>,
}

impl RawBar {
    /// A row that only carries a close price.
    pub fn close_only(date: NaiveDate, close: Decimal) -> Self {
        Self {
            date,
            open: None,
            high: None,
            low: None,
            close,
            volume: None,
        }
    }
}

/// Turn provider rows into [`PriceRecord`]s.
///
/// Rows are ordered ascending by date with duplicate dates collapsed (the
/// later row wins). `change` and `change_percent` compare each close with the
/// previous one; the first row of a series has no predecessor and gets zero.
pub fn standardize(ticker: &str, source: &str, bars: Vec<RawBar>) -> Vec<PriceRecord> {
    let mut by_date: BTreeMap<NaiveDate, RawBar> = BTreeMap::new();
    for bar in bars {
        by_date.insert(bar.date, bar);
    }

    let ticker = ticker.trim().to_uppercase();
    let mut previous_close: Option<Decimal> = None;

    by_date
        .into_values()
        .map(|bar| {
            let (change, change_percent) = match previous_close {
                // Out-of-range values from a provider zero the field rather than panic
                Some(prev) => match bar.close.checked_sub(prev) {
                    Some(change) => {
                        let percent = change
                            .checked_div(prev)
                            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
                            .map(|pct| pct.round_dp(PERCENT_SCALE))
                            .unwrap_or(Decimal::ZERO);
                        (change, percent)
                    }
                    None => (Decimal::ZERO, Decimal::ZERO),
                },
                None => (Decimal::ZERO, Decimal::ZERO),
            };
            previous_close = Some(bar.close);

            PriceRecord {
                date: bar.date,
                open: bar.open.unwrap_or(Decimal::ZERO),
                high: bar.high.unwrap_or(Decimal::ZERO),
                low: bar.low.unwrap_or(Decimal::ZERO),
                close: bar.close,
                volume: bar.volume.unwrap_or(0),
                change,
                change_percent,
                ticker: ticker.clone(),
                source: source.to_string(),
            }
        })
        .collect()
}

/// Parse a price cell, treating blanks and provider null markers as missing.
pub(crate) fn parse_decimal(s: &str) -> Option<Decimal> {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") || trimmed == "-" {
        return None;
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()
}

/// Parse a volume cell. Some providers send volumes as `1234.0`.
pub(crate) fn parse_volume(s: &str) -> Option<u64> {
    parse_decimal(s).and_then(|v| v.trunc().to_u64())
}

/// Parse a `YYYY-MM-DD` date cell.
pub(crate) fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}
