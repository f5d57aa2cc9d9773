use std::{path::PathBuf, time::Duration};

/// Log output format for the stderr subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

pub struct Config {
    pub cache_dir: PathBuf,
    pub cache_expiry: Duration,
    pub alpha_vantage_key: String,
    pub http_timeout: Duration,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let cache_dir = std::env::var("PRICEFEED_CACHE_DIR")
            .unwrap_or_else(|_| "./data/prices".into())
            .into();
        let expiry_hours: u64 = std::env::var("PRICEFEED_CACHE_EXPIRY_HOURS")
            .unwrap_or_else(|_| "24".into())
            .parse()
            .unwrap_or(24);
        let alpha_vantage_key = std::env::var("PRICEFEED_ALPHA_VANTAGE_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .unwrap_or_else(|| "demo".into());
        let timeout_secs: u64 = std::env::var("PRICEFEED_HTTP_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .unwrap_or(30);
        let log_format = match std::env::var("PRICEFEED_LOG_FORMAT") {
            Ok(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };
        Self {
            cache_dir,
            cache_expiry: Duration::from_secs(expiry_hours * 60 * 60),
            alpha_vantage_key,
            http_timeout: Duration::from_secs(timeout_secs),
            log_format,
        }
    }
}
