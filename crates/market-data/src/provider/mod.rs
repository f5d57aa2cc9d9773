//! Price source abstractions and implementations.
//!
//! This module contains:
//! - The `PriceSource` trait that every adapter implements
//! - Per-source rate limiting configuration
//! - The shared `standardize` step that turns provider rows into `PriceRecord`s
//! - Concrete adapters (Stooq, Alpha Vantage, Yahoo Finance)
//!
//! Adapters only fetch and normalize. Rate limiting, fallback order and
//! error absorption live in the registry.

mod capabilities;
mod csv_table;
mod standardize;
mod traits;

pub mod alpha_vantage;
pub mod stooq;
pub mod yahoo;

pub use capabilities::RateLimit;
pub use standardize::{standardize, RawBar};
pub use traits::PriceSource;
