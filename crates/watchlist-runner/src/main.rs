//! Watchlist runner
//!
//! Fetches a quote for every watchlist symbol through the provider guard,
//! once or on a fixed interval, persisting the quote cache between runs.

mod config;
mod cycle;
mod error;

use crate::config::RunnerConfig;
use crate::cycle::{fetch_quote, run_cycle};
use crate::error::Result;
use clap::Parser;
use provider_guard::{spawn_maintenance, ExecutionWrapper, ResourceMonitor, Shutdown};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};
use ttl_lru_cache::CacheRegistry;
use twelve_data_client::{Quote, TwelveDataClient};

#[derive(Parser, Debug)]
#[command(name = "watchlist-runner", about = "Fetch watchlist quotes through the provider guard")]
struct Args {
    /// Keep running cycles until interrupted
    #[arg(long = "loop")]
    run_loop: bool,

    /// Seconds between cycles in loop mode
    #[arg(long, default_value_t = 3600)]
    interval: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::from_default_env()
        .add_directive("watchlist_runner=info".parse()?)
        .add_directive("provider_guard=info".parse()?)
        .add_directive("ttl_lru_cache=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    let args = Args::parse();
    let config = RunnerConfig::from_env()?;
    info!(symbols = config.watchlist.len(), cache_dir = %config.cache_dir.display(), "Starting watchlist runner");

    let client = TwelveDataClient::new(config.api_key.as_str())?;

    let registry: Arc<CacheRegistry<Quote>> = Arc::new(CacheRegistry::new());
    let quotes = registry
        .get_or_create(
            "market_quotes",
            config.quote_cache.capacity,
            config.quote_cache.default_ttl,
            config.quote_cache_path(),
        )
        .await?;

    let monitor = Arc::new(ResourceMonitor::new(config.resource.clone())?);
    let (trigger, shutdown) = Shutdown::channel();
    let wrapper = ExecutionWrapper::new(
        "twelve_data",
        &config.guard,
        quotes,
        Arc::clone(&monitor),
        shutdown.clone(),
    )?
    .with_registry(Arc::clone(&registry));

    let maintenance = spawn_maintenance(
        Arc::clone(&registry),
        Arc::clone(&monitor),
        config.flush_interval,
        shutdown.clone(),
    );

    let trigger = Arc::new(trigger);
    let signal_trigger = Arc::clone(&trigger);
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_trigger.trigger();
    });

    let interval = Duration::from_secs(args.interval);
    let ttl = config.quote_cache.default_ttl;
    let mut stop = shutdown.clone();

    loop {
        let report = run_cycle(&config.watchlist, &wrapper, &registry, ttl, |symbol| {
            fetch_quote(&client, symbol)
        })
        .await;

        if !args.run_loop || report.cancelled {
            break;
        }

        info!(secs = interval.as_secs(), "Sleeping until next cycle");
        tokio::select! {
            _ = stop.wait() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    // Stops the maintenance task, which flushes every cache on its way out
    trigger.trigger();
    if let Err(e) = maintenance.await {
        error!("Maintenance task failed: {}", e);
    }

    info!("Watchlist runner stopped");
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
