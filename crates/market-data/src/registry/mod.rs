//! Source registry module.
//!
//! This module provides orchestration for price sources:
//! - Priority ordering and fixed-order fallback
//! - Sliding-window rate limiting per source
//! - Per-fetch attempt diagnostics

mod diagnostics;
mod rate_limiter;
mod registry;

pub use diagnostics::{AttemptOutcome, FetchDiagnostics, SourceAttempt};
pub use rate_limiter::{RateLimiter, WindowStats, WINDOW};
pub use registry::SourceRegistry;
