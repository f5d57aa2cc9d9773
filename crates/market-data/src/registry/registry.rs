//! Source registry for orchestrating price sources.
//!
//! The registry owns the sources in fallback order and the rate limiter
//! they share. A fetch walks the sources one at a time until one of them
//! returns rows.

use std::borrow::Cow;
use std::sync::Arc;

use log::{debug, error, info, warn};

use super::diagnostics::{AttemptOutcome, FetchDiagnostics};
use super::RateLimiter;
use crate::errors::{MarketDataError, RetryClass};
use crate::models::{PriceRequest, ProviderId, SourcedPrices};
use crate::provider::PriceSource;

/// Source registry for fallback price fetching.
pub struct SourceRegistry {
    sources: Vec<Arc<dyn PriceSource>>,
    rate_limiter: RateLimiter,
}

impl SourceRegistry {
    /// Create a registry with a fresh rate limiter.
    pub fn new(sources: Vec<Arc<dyn PriceSource>>) -> Self {
        Self::with_rate_limiter(sources, RateLimiter::new())
    }

    /// Create a registry around an existing rate limiter.
    ///
    /// Each source's quota is registered with the limiter. Sources are kept
    /// in priority order; ties keep their registration order.
    pub fn with_rate_limiter(
        mut sources: Vec<Arc<dyn PriceSource>>,
        rate_limiter: RateLimiter,
    ) -> Self {
        sources.sort_by_key(|s| s.priority());

        for source in &sources {
            rate_limiter.configure(source.id(), source.rate_limit().requests_per_minute);
        }

        Self {
            sources,
            rate_limiter,
        }
    }

    /// Fetch prices for a request.
    ///
    /// Tries sources in priority order:
    /// 1. Wait for the source's rate limit window
    /// 2. Fetch and normalize
    /// 3. Return the first non-empty result
    /// 4. Empty results and transient errors move on to the next source
    ///
    /// An unexpected error is logged and skipped, unless it comes from the
    /// last source, in which case it is returned. When nothing produced
    /// rows the result is [`MarketDataError::AllSourcesFailed`].
    pub async fn fetch_prices(
        &self,
        request: &PriceRequest,
    ) -> Result<SourcedPrices, MarketDataError> {
        let mut diagnostics = FetchDiagnostics::new();
        let last_index = self.sources.len().saturating_sub(1);

        for (index, source) in self.sources.iter().enumerate() {
            let source_id: ProviderId = Cow::Borrowed(source.id());

            let waited = self.rate_limiter.wait_if_needed(&source_id).await;
            if !waited.is_zero() {
                debug!(
                    "Waited {:.2}s for rate limit on '{}'",
                    waited.as_secs_f64(),
                    source_id
                );
            }

            info!(
                "Fetching {} ({} to {}) from {}",
                request.ticker,
                request.start,
                request.end,
                source.display_name()
            );

            match source.fetch_prices(request).await {
                Ok(records) if !records.is_empty() => {
                    diagnostics.record(
                        source_id,
                        AttemptOutcome::Success {
                            records: records.len(),
                        },
                        waited.as_secs_f64(),
                    );
                    info!(
                        "Fetched {} records for {} from {}. Diagnostics: {}",
                        records.len(),
                        request.ticker,
                        source.display_name(),
                        diagnostics.summary()
                    );
                    return Ok(SourcedPrices {
                        source: source.display_name().to_string(),
                        records,
                        diagnostics,
                    });
                }
                Ok(_) => {
                    warn!(
                        "{} returned no data for {}, trying next source",
                        source.display_name(),
                        request.ticker
                    );
                    diagnostics.record(source_id, AttemptOutcome::Empty, waited.as_secs_f64());
                }
                Err(e) => {
                    diagnostics.record(
                        source_id,
                        AttemptOutcome::Failed {
                            message: e.to_string(),
                        },
                        waited.as_secs_f64(),
                    );

                    match e.retry_class() {
                        RetryClass::Terminal => {
                            debug!(
                                "Terminal error from '{}': {}, not trying other sources",
                                source.id(),
                                e
                            );
                            return Err(e);
                        }
                        RetryClass::NextSource => {
                            warn!(
                                "{} failed for {}: {}, trying next source",
                                source.display_name(),
                                request.ticker,
                                e
                            );
                        }
                        RetryClass::Unexpected => {
                            error!(
                                "Unexpected error from {} for {}: {}",
                                source.display_name(),
                                request.ticker,
                                e
                            );
                            if index == last_index {
                                return Err(e);
                            }
                        }
                    }
                }
            }
        }

        warn!(
            "All sources failed for {}. Diagnostics: {}",
            request.ticker,
            diagnostics.summary()
        );
        Err(MarketDataError::AllSourcesFailed)
    }

    /// Get the sources in fallback order.
    pub fn sources(&self) -> &[Arc<dyn PriceSource>] {
        &self.sources
    }

    /// Get the shared rate limiter.
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceRecord;
    use crate::provider::{standardize, RateLimit, RawBar};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Copy)]
    enum Behavior {
        Rows,
        Empty,
        Transient,
        Unexpected,
        Terminal,
    }

    struct MockSource {
        id: &'static str,
        name: &'static str,
        priority: u8,
        behavior: Behavior,
        call_count: AtomicUsize,
    }

    impl MockSource {
        fn new(id: &'static str, name: &'static str, priority: u8, behavior: Behavior) -> Self {
            Self {
                id,
                name,
                priority,
                behavior,
                call_count: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PriceSource for MockSource {
        fn id(&self) -> &'static str {
            self.id
        }

        fn display_name(&self) -> &'static str {
            self.name
        }

        fn priority(&self) -> u8 {
            self.priority
        }

        fn rate_limit(&self) -> RateLimit {
            RateLimit::per_minute(100)
        }

        async fn fetch_prices(
            &self,
            request: &PriceRequest,
        ) -> Result<Vec<PriceRecord>, MarketDataError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);

            match self.behavior {
                Behavior::Rows => Ok(standardize(
                    &request.ticker,
                    self.name,
                    vec![
                        RawBar::close_only(request.start, dec!(100)),
                        RawBar::close_only(request.end, dec!(101)),
                    ],
                )),
                Behavior::Empty => Ok(Vec::new()),
                Behavior::Transient => Err(MarketDataError::Timeout {
                    provider: self.id.to_string(),
                }),
                Behavior::Unexpected => Err(MarketDataError::Internal("boom".to_string())),
                Behavior::Terminal => Err(MarketDataError::InvalidRequest("bad".to_string())),
            }
        }
    }

    fn request() -> PriceRequest {
        PriceRequest::new(
            "AAPL",
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            true,
        )
        .unwrap()
    }

    fn registry(sources: &[&Arc<MockSource>]) -> SourceRegistry {
        let sources: Vec<Arc<dyn PriceSource>> = sources
            .iter()
            .map(|s| Arc::clone(*s) as Arc<dyn PriceSource>)
            .collect();
        SourceRegistry::new(sources)
    }

    #[test]
    fn test_sources_ordered_by_priority() {
        let low = Arc::new(MockSource::new("LOW", "Low", 20, Behavior::Rows));
        let high = Arc::new(MockSource::new("HIGH", "High", 1, Behavior::Rows));
        let mid = Arc::new(MockSource::new("MID", "Mid", 10, Behavior::Rows));

        let registry = registry(&[&low, &high, &mid]);
        let ids: Vec<_> = registry.sources().iter().map(|s| s.id()).collect();

        assert_eq!(ids, vec!["HIGH", "MID", "LOW"]);
        assert_eq!(registry.rate_limiter().limit_for("MID"), 100);
    }

    #[tokio::test]
    async fn test_first_source_with_rows_wins() {
        let first = Arc::new(MockSource::new("A", "Source A", 1, Behavior::Rows));
        let second = Arc::new(MockSource::new("B", "Source B", 2, Behavior::Rows));

        let result = registry(&[&first, &second])
            .fetch_prices(&request())
            .await
            .unwrap();

        assert_eq!(result.source, "Source A");
        assert_eq!(result.records.len(), 2);
        assert_eq!(second.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_source_falls_back_to_next() {
        let first = Arc::new(MockSource::new("A", "Source A", 1, Behavior::Empty));
        let second = Arc::new(MockSource::new("B", "Source B", 2, Behavior::Rows));

        let result = registry(&[&first, &second])
            .fetch_prices(&request())
            .await
            .unwrap();

        assert_eq!(result.source, "Source B");
        assert!(result.records.iter().all(|r| r.source == "Source B"));
        assert_eq!(first.calls(), 1);
        assert_eq!(result.diagnostics.attempts.len(), 2);
        assert_eq!(result.diagnostics.attempts[0].outcome, AttemptOutcome::Empty);
    }

    #[tokio::test]
    async fn test_transient_error_is_absorbed() {
        let first = Arc::new(MockSource::new("A", "Source A", 1, Behavior::Transient));
        let second = Arc::new(MockSource::new("B", "Source B", 2, Behavior::Rows));

        let result = registry(&[&first, &second])
            .fetch_prices(&request())
            .await
            .unwrap();

        assert_eq!(result.source, "Source B");
        assert!(matches!(
            &result.diagnostics.attempts[0].outcome,
            AttemptOutcome::Failed { message } if message.contains("Timeout")
        ));
    }

    #[tokio::test]
    async fn test_all_empty_is_all_sources_failed() {
        let a = Arc::new(MockSource::new("A", "Source A", 1, Behavior::Empty));
        let b = Arc::new(MockSource::new("B", "Source B", 2, Behavior::Transient));
        let c = Arc::new(MockSource::new("C", "Source C", 3, Behavior::Empty));

        let err = registry(&[&a, &b, &c])
            .fetch_prices(&request())
            .await
            .unwrap_err();

        assert!(matches!(err, MarketDataError::AllSourcesFailed));
        assert_eq!(err.to_string(), "All data sources failed");
        assert_eq!(a.calls() + b.calls() + c.calls(), 3);
    }

    #[tokio::test]
    async fn test_unexpected_error_skipped_unless_last() {
        let a = Arc::new(MockSource::new("A", "Source A", 1, Behavior::Unexpected));
        let b = Arc::new(MockSource::new("B", "Source B", 2, Behavior::Rows));

        let result = registry(&[&a, &b]).fetch_prices(&request()).await.unwrap();
        assert_eq!(result.source, "Source B");

        let c = Arc::new(MockSource::new("C", "Source C", 1, Behavior::Empty));
        let d = Arc::new(MockSource::new("D", "Source D", 2, Behavior::Unexpected));

        let err = registry(&[&c, &d]).fetch_prices(&request()).await.unwrap_err();
        assert!(matches!(err, MarketDataError::Internal(_)));
    }

    #[tokio::test]
    async fn test_terminal_error_stops_fallback() {
        let a = Arc::new(MockSource::new("A", "Source A", 1, Behavior::Terminal));
        let b = Arc::new(MockSource::new("B", "Source B", 2, Behavior::Rows));

        let err = registry(&[&a, &b]).fetch_prices(&request()).await.unwrap_err();

        assert!(matches!(err, MarketDataError::InvalidRequest(_)));
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test]
    async fn test_no_sources() {
        let registry = SourceRegistry::new(Vec::new());
        let err = registry.fetch_prices(&request()).await.unwrap_err();
        assert!(matches!(err, MarketDataError::AllSourcesFailed));
    }

    #[tokio::test]
    async fn test_each_attempt_is_counted_by_limiter() {
        let a = Arc::new(MockSource::new("A", "Source A", 1, Behavior::Empty));
        let b = Arc::new(MockSource::new("B", "Source B", 2, Behavior::Rows));
        let registry = registry(&[&a, &b]);

        registry.fetch_prices(&request()).await.unwrap();

        let stats = registry.rate_limiter().stats();
        assert_eq!(stats.len(), 2);
        assert!(stats.iter().all(|s| s.calls_last_minute == 1));
    }
}
