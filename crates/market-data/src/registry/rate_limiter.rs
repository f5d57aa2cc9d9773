//! Sliding-window rate limiter for price sources.
//!
//! Each source gets a window of call instants covering the trailing minute.
//! Once the window holds `limit` calls, the next caller sleeps until the
//! oldest call ages out.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::time::Instant;

/// Length of the sliding window.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Limit applied to sources that were never configured.
const DEFAULT_REQUESTS_PER_MINUTE: u32 = 60;

/// Call history for a single source.
#[derive(Debug, Default)]
struct RateWindow {
    /// Call instants inside the window, oldest first.
    calls: VecDeque<Instant>,
    last_call: Option<Instant>,
}

impl RateWindow {
    /// Drop calls that are a full window old.
    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.calls.front() {
            if now.duration_since(oldest) >= WINDOW {
                self.calls.pop_front();
            } else {
                break;
            }
        }
    }

    /// How long until a call is allowed under `limit`.
    fn time_until_available(&mut self, now: Instant, limit: u32) -> Duration {
        self.prune(now);

        if (self.calls.len() as u64) < u64::from(limit) {
            return Duration::ZERO;
        }

        match self.calls.front() {
            Some(&oldest) => WINDOW.saturating_sub(now.duration_since(oldest)),
            None => Duration::ZERO,
        }
    }

    fn record(&mut self, now: Instant) {
        self.calls.push_back(now);
        self.last_call = Some(now);
    }
}

/// Point-in-time usage of one source's window.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WindowStats {
    pub source: String,
    pub limit_per_minute: u32,
    pub calls_last_minute: usize,
    /// `None` if the source was never called
    pub seconds_since_last_call: Option<f64>,
}

/// Per-source sliding-window rate limiter.
///
/// Owned by the [`SourceRegistry`](super::SourceRegistry); tests build their
/// own isolated instances.
pub struct RateLimiter {
    windows: Mutex<HashMap<String, RateWindow>>,
    limits: Mutex<HashMap<String, u32>>,
}

impl RateLimiter {
    /// Create a limiter where every source gets the default limit.
    pub fn new() -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            limits: Mutex::new(HashMap::new()),
        }
    }

    /// Lock the windows mutex, recovering from poison if necessary.
    ///
    /// A poisoned window map only means a slightly wrong call count.
    fn lock_windows(&self) -> MutexGuard<'_, HashMap<String, RateWindow>> {
        self.windows.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter windows mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_limits(&self) -> MutexGuard<'_, HashMap<String, u32>> {
        self.limits.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter limits mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Set the calls-per-minute quota for a source.
    pub fn configure(&self, source: &str, requests_per_minute: u32) {
        self.lock_limits()
            .insert(source.to_string(), requests_per_minute);
    }

    /// Quota for a source.
    pub fn limit_for(&self, source: &str) -> u32 {
        self.lock_limits()
            .get(source)
            .copied()
            .unwrap_or(DEFAULT_REQUESTS_PER_MINUTE)
    }

    /// Wait until `source` has quota left in the trailing window, then
    /// record the call.
    ///
    /// Returns how long the caller was suspended.
    pub async fn wait_if_needed(&self, source: &str) -> Duration {
        let limit = self.limit_for(source);
        let mut waited = Duration::ZERO;

        loop {
            let wait_time = {
                let mut windows = self.lock_windows();
                let window = windows.entry(source.to_string()).or_default();
                let now = Instant::now();

                let wait_time = window.time_until_available(now, limit);
                if wait_time.is_zero() {
                    window.record(now);
                    debug!(
                        "API call to {} (count: {}/{})",
                        source,
                        window.calls.len(),
                        limit
                    );
                    return waited;
                }
                wait_time
            };

            info!(
                "Rate limit reached for {}, waiting {:.1} seconds",
                source,
                wait_time.as_secs_f64()
            );
            tokio::time::sleep(wait_time).await;
            waited += wait_time;
        }
    }

    /// Forget all recorded calls for a source.
    pub fn reset(&self, source: &str) {
        self.lock_windows().remove(source);
    }

    /// Usage for every configured or previously called source, by name.
    pub fn stats(&self) -> Vec<WindowStats> {
        let now = Instant::now();
        let limits = self.lock_limits().clone();
        let mut names: Vec<String> = limits.keys().cloned().collect();

        let mut windows = self.lock_windows();
        for name in windows.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names.sort();

        names
            .into_iter()
            .map(|source| {
                let limit_per_minute = limits
                    .get(&source)
                    .copied()
                    .unwrap_or(DEFAULT_REQUESTS_PER_MINUTE);
                let (calls_last_minute, seconds_since_last_call) = match windows.get_mut(&source)
                {
                    Some(window) => {
                        window.prune(now);
                        (
                            window.calls.len(),
                            window
                                .last_call
                                .map(|t| now.duration_since(t).as_secs_f64()),
                        )
                    }
                    None => (0, None),
                };

                WindowStats {
                    source,
                    limit_per_minute,
                    calls_last_minute,
                    seconds_since_last_call,
                }
            })
            .collect()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_allows_up_to_limit() {
        let mut window = RateWindow::default();
        let now = Instant::now();

        for _ in 0..3 {
            assert_eq!(window.time_until_available(now, 3), Duration::ZERO);
            window.record(now);
        }

        assert_eq!(window.time_until_available(now, 3), WINDOW);
    }

    #[test]
    fn test_window_wait_counts_from_oldest_call() {
        let mut window = RateWindow::default();
        let start = Instant::now();
        window.record(start);
        window.record(start + Duration::from_secs(20));

        let wait = window.time_until_available(start + Duration::from_secs(45), 2);
        assert_eq!(wait, Duration::from_secs(15));
    }

    #[test]
    fn test_window_prunes_expired_calls() {
        let mut window = RateWindow::default();
        let start = Instant::now();
        window.record(start);
        window.record(start + Duration::from_secs(10));

        let later = start + Duration::from_secs(61);
        assert_eq!(window.time_until_available(later, 2), Duration::ZERO);
        assert_eq!(window.calls.len(), 1);
    }

    #[test]
    fn test_limit_defaults_and_configure() {
        let limiter = RateLimiter::new();
        assert_eq!(limiter.limit_for("UNKNOWN"), 60);

        limiter.configure("ALPHA_VANTAGE", 5);
        assert_eq!(limiter.limit_for("ALPHA_VANTAGE"), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_under_limit_do_not_wait() {
        let limiter = RateLimiter::new();
        limiter.configure("STOOQ", 3);

        for _ in 0..3 {
            assert_eq!(limiter.wait_if_needed("STOOQ").await, Duration::ZERO);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_over_limit_blocks() {
        let limiter = RateLimiter::new();
        limiter.configure("ALPHA_VANTAGE", 5);

        for _ in 0..5 {
            limiter.wait_if_needed("ALPHA_VANTAGE").await;
        }

        let start = Instant::now();
        let waited = limiter.wait_if_needed("ALPHA_VANTAGE").await;

        assert!(waited > Duration::ZERO);
        assert!(start.elapsed() >= waited);
        assert!(waited <= WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sources_are_isolated() {
        let limiter = RateLimiter::new();
        limiter.configure("A", 1);
        limiter.configure("B", 1);

        limiter.wait_if_needed("A").await;
        assert_eq!(limiter.wait_if_needed("B").await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_window() {
        let limiter = RateLimiter::new();
        limiter.configure("YAHOO", 1);

        limiter.wait_if_needed("YAHOO").await;
        limiter.reset("YAHOO");

        assert_eq!(limiter.wait_if_needed("YAHOO").await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_reports_usage() {
        let limiter = RateLimiter::new();
        limiter.configure("STOOQ", 60);
        limiter.configure("YAHOO", 30);

        limiter.wait_if_needed("STOOQ").await;
        limiter.wait_if_needed("STOOQ").await;

        let stats = limiter.stats();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].source, "STOOQ");
        assert_eq!(stats[0].calls_last_minute, 2);
        assert!(stats[0].seconds_since_last_call.is_some());
        assert_eq!(stats[1].source, "YAHOO");
        assert_eq!(stats[1].calls_last_minute, 0);
        assert_eq!(stats[1].seconds_since_last_call, None);
    }
}
