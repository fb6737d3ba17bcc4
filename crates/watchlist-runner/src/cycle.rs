//! One evaluation cycle over the watchlist

use provider_guard::{ExecutionWrapper, GuardError, ProviderError};
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};
use ttl_lru_cache::CacheRegistry;
use twelve_data_client::{Quote, TwelveDataClient};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Shutdown arrived before every symbol was looked up
    pub cancelled: bool,
}

/// Fetch a quote, classifying failures for the retry policy
pub async fn fetch_quote(client: &TwelveDataClient, symbol: String) -> Result<Quote, ProviderError> {
    client.quote(&symbol).await.map_err(|e| {
        if e.is_transient() {
            ProviderError::transient(e)
        } else {
            ProviderError::permanent(e)
        }
    })
}

pub fn quote_key(symbol: &str) -> String {
    format!("quote:{}", symbol)
}

/// Look up every symbol in order, then sweep and report the caches
///
/// A failing symbol is logged and skipped. Only shutdown ends the cycle early.
pub async fn run_cycle<F, Fut>(
    watchlist: &[String],
    wrapper: &ExecutionWrapper<Quote>,
    registry: &CacheRegistry<Quote>,
    ttl: Duration,
    fetch: F,
) -> CycleReport
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<Quote, ProviderError>>,
{
    let mut report = CycleReport::default();
    info!(symbols = watchlist.len(), "Starting watchlist cycle");

    for (i, symbol) in watchlist.iter().enumerate() {
        let key = quote_key(symbol);
        match wrapper.run(&key, ttl, || fetch(symbol.clone())).await {
            Ok(quote) => {
                report.succeeded += 1;
                info!(
                    symbol = %symbol,
                    price = quote.price,
                    percent_change = ?quote.percent_change,
                    position = i + 1,
                    total = watchlist.len(),
                    "Quote"
                );
            }
            Err(GuardError::Cancelled) => {
                report.cancelled = true;
                info!(symbol = %symbol, "Shutdown requested, ending cycle early");
                break;
            }
            Err(e @ (GuardError::RateLimited { .. } | GuardError::CircuitOpen { .. })) => {
                report.failed += 1;
                warn!(symbol = %symbol, error = %e, "Quote skipped");
            }
            Err(e) => {
                report.failed += 1;
                error!(symbol = %symbol, error = %e, "Quote lookup failed");
            }
        }
    }

    let expired: usize = registry.evict_expired_all().await.values().sum();
    for (name, stats) in registry.stats().await {
        info!(
            cache = %name,
            entries = stats.entries,
            capacity = stats.capacity,
            hits = stats.hits,
            misses = stats.misses,
            evictions = stats.evictions,
            "Cache stats"
        );
    }
    info!(
        succeeded = report.succeeded,
        failed = report.failed,
        expired,
        "Watchlist cycle complete"
    );

    report
}
