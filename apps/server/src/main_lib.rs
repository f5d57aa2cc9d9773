use std::sync::Arc;

use crate::config::{Config, LogFormat};
use crate::service::PriceService;
use pricefeed_market_data::{
    AlphaVantageProvider, PriceCache, PriceSource, SourceRegistry, StooqProvider, YahooProvider,
};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. Logs go to stderr; stdout carries the
/// protocol.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

/// Sources in their default fallback order.
pub fn default_sources(config: &Config) -> Vec<Arc<dyn PriceSource>> {
    let mut sources: Vec<Arc<dyn PriceSource>> = vec![
        Arc::new(StooqProvider::new(config.http_timeout)),
        Arc::new(AlphaVantageProvider::new(
            config.alpha_vantage_key.clone(),
            config.http_timeout,
        )),
    ];

    match YahooProvider::new(config.http_timeout) {
        Ok(yahoo) => sources.push(Arc::new(yahoo)),
        Err(e) => tracing::warn!("Yahoo Finance source disabled: {}", e),
    }

    sources
}

pub fn build_state(config: &Config) -> anyhow::Result<Arc<PriceService>> {
    let sources = default_sources(config);
    if sources.is_empty() {
        anyhow::bail!("No price sources could be initialized");
    }

    let registry = SourceRegistry::new(sources);
    let names: Vec<&str> = registry.sources().iter().map(|s| s.display_name()).collect();
    tracing::info!("Price sources in fallback order: {}", names.join(" -> "));

    let cache = PriceCache::in_dir(config.cache_dir.clone(), config.cache_expiry);
    tracing::info!(
        "Cache directory in use: {} (expiry {}h)",
        config.cache_dir.display(),
        config.cache_expiry.as_secs() / 3600
    );

    Ok(Arc::new(PriceService::new(registry, cache)))
}
