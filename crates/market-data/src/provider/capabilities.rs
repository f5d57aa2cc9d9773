//! Rate limiting configuration for a price source.

/// How aggressively a source may be called.
///
/// The registry feeds this into its [`RateLimiter`](crate::registry::RateLimiter)
/// when the source is registered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimit {
    /// Maximum requests allowed in any 60-second window.
    pub requests_per_minute: u32,
}

impl RateLimit {
    pub const fn per_minute(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
        }
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::per_minute(60)
    }
}
