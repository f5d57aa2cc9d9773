//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all fetch operations
//! - [`RetryClass`]: Classification for determining fallback behavior

mod cache;
mod retry;

pub use cache::CacheError;
pub use retry::RetryClass;

use thiserror::Error;

/// Errors that can occur while fetching price history.
///
/// Each variant is classified into a [`RetryClass`] via the [`retry_class`](Self::retry_class)
/// method, which determines how the source registry reacts to it.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The requested symbol was not found by the provider.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The symbol exists but has no rows in the requested period.
    #[error("No data for date range")]
    NoDataForRange,

    /// The provider throttled the request (HTTP 429 or an in-body notice).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The request to the provider timed out.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// A provider-specific error occurred (bad status, error body, ...).
    #[error("Provider error: {provider} - {message}")]
    ProviderError {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// The provider answered, but the body could not be parsed.
    #[error("Parse error: {provider} - {message}")]
    Parse {
        /// The provider whose response was malformed
        provider: String,
        /// What went wrong while parsing
        message: String,
    },

    /// The request itself is invalid (bad ticker, inverted range).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Every source was tried and none returned data.
    #[error("All data sources failed")]
    AllSourcesFailed,

    /// Anything a source did not anticipate.
    #[error("{0}")]
    Internal(String),

    /// A network error occurred while communicating with a provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MarketDataError {
    /// Returns the retry classification for this error.
    ///
    /// - [`RetryClass::NextSource`]: absorbed as an empty result, next source is tried
    /// - [`RetryClass::Unexpected`]: logged; fatal only when raised by the last source
    /// - [`RetryClass::Terminal`]: no source can help, stop immediately
    ///
    /// # Examples
    ///
    /// ```
    /// use pricefeed_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::RateLimited { provider: "STOOQ".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::NextSource);
    ///
    /// let error = MarketDataError::Internal("boom".to_string());
    /// assert_eq!(error.retry_class(), RetryClass::Unexpected);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            // Transient or provider-local - fall back to the next source
            Self::SymbolNotFound(_)
            | Self::NoDataForRange
            | Self::RateLimited { .. }
            | Self::Timeout { .. }
            | Self::ProviderError { .. }
            | Self::Parse { .. }
            | Self::Network(_) => RetryClass::NextSource,

            Self::Internal(_) => RetryClass::Unexpected,

            Self::InvalidRequest(_) | Self::AllSourcesFailed => RetryClass::Terminal,
        }
    }

    pub(crate) fn provider(provider: &str, message: impl Into<String>) -> Self {
        Self::ProviderError {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn parse(provider: &str, message: impl Into<String>) -> Self {
        Self::Parse {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_not_found_falls_back() {
        let error = MarketDataError::SymbolNotFound("INVALID".to_string());
        assert_eq!(error.retry_class(), RetryClass::NextSource);
    }

    #[test]
    fn test_rate_limited_falls_back() {
        let error = MarketDataError::RateLimited {
            provider: "ALPHA_VANTAGE".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::NextSource);
    }

    #[test]
    fn test_timeout_falls_back() {
        let error = MarketDataError::Timeout {
            provider: "YAHOO".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::NextSource);
    }

    #[test]
    fn test_parse_error_falls_back() {
        let error = MarketDataError::parse("STOOQ", "missing Close column");
        assert_eq!(error.retry_class(), RetryClass::NextSource);
    }

    #[test]
    fn test_internal_is_unexpected() {
        let error = MarketDataError::Internal("unreachable state".to_string());
        assert_eq!(error.retry_class(), RetryClass::Unexpected);
    }

    #[test]
    fn test_invalid_request_is_terminal() {
        let error = MarketDataError::InvalidRequest("start after end".to_string());
        assert_eq!(error.retry_class(), RetryClass::Terminal);
        assert_eq!(
            MarketDataError::AllSourcesFailed.retry_class(),
            RetryClass::Terminal
        );
    }

    #[test]
    fn test_error_display() {
        let error = MarketDataError::SymbolNotFound("INVALID".to_string());
        assert_eq!(format!("{}", error), "Symbol not found: INVALID");

        let error = MarketDataError::provider("ALPHA_VANTAGE", "HTTP 500");
        assert_eq!(
            format!("{}", error),
            "Provider error: ALPHA_VANTAGE - HTTP 500"
        );

        assert_eq!(
            MarketDataError::AllSourcesFailed.to_string(),
            "All data sources failed"
        );
    }
}
