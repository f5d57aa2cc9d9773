//! Market data models
//!
//! - `types` - Type aliases for common identifiers (ProviderId)
//! - `price_record` - One normalized trading day (PriceRecord)
//! - `request` - Fetch parameters and results (PriceRequest, SourcedPrices)

mod price_record;
mod request;
mod types;

pub use price_record::PriceRecord;
pub use request::{normalize_symbol, PriceRequest, SourcedPrices};
pub use types::ProviderId;
