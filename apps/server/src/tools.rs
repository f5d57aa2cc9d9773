//! Tool names and their advertised input schemas.

use serde_json::{json, Value};

pub const GET_PRICES: &str = "get_prices";
pub const GET_CURRENT_PRICE: &str = "get_current_price";
pub const GET_CACHE_STATS: &str = "get_cache_stats";
pub const CLEAR_CACHE: &str = "clear_cache";

/// Definitions returned by `tools/list`.
pub fn tool_definitions() -> Value {
    json!([
        {
            "name": GET_PRICES,
            "description": "Fetch historical stock price data",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "ticker": {
                        "type": "string",
                        "description": "Ticker symbol, e.g. AAPL"
                    },
                    "start": {
                        "type": "string",
                        "description": "First day, YYYY-MM-DD"
                    },
                    "end": {
                        "type": "string",
                        "description": "Last day (inclusive), YYYY-MM-DD"
                    },
                    "adjusted": { "type": "boolean", "default": true },
                    "use_cache": { "type": "boolean", "default": true }
                },
                "required": ["ticker", "start", "end"]
            }
        },
        {
            "name": GET_CURRENT_PRICE,
            "description": "Get current price for a stock ticker",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "ticker": { "type": "string" }
                },
                "required": ["ticker"]
            }
        },
        {
            "name": GET_CACHE_STATS,
            "description": "Show cache contents and per-source rate limit usage",
            "inputSchema": {
                "type": "object",
                "properties": {}
            }
        },
        {
            "name": CLEAR_CACHE,
            "description": "Clear cached prices for one ticker, or all tickers when omitted",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "ticker": { "type": "string" }
                }
            }
        }
    ])
}
