//! Background cache upkeep
//!
//! Periodically sweeps expired entries out of every registered cache and
//! flushes them to disk, so a crash loses at most one interval of results.

use crate::resource::{MemoryPressure, ResourceMonitor};
use crate::shutdown::Shutdown;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use ttl_lru_cache::CacheRegistry;

/// Outcome of one maintenance pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Expired entries removed, per cache name
    pub expired: BTreeMap<String, usize>,
    /// Caches whose snapshot was written successfully
    pub flushed: usize,
    pub pressure: MemoryPressure,
}

impl MaintenanceReport {
    pub fn expired_total(&self) -> usize {
        self.expired.values().sum()
    }
}

/// Sweep every cache, then flush every cache
pub async fn run_maintenance_pass<V>(
    registry: &CacheRegistry<V>,
    monitor: &ResourceMonitor,
) -> MaintenanceReport
where
    V: Clone + Serialize + DeserializeOwned + Send,
{
    let pressure = monitor.memory_pressure().await;
    let expired = registry.evict_expired_all().await;
    let flushed = registry.flush_all().await;

    let report = MaintenanceReport {
        expired,
        flushed,
        pressure,
    };

    match pressure {
        MemoryPressure::Normal => debug!(
            expired = report.expired_total(),
            flushed, "Cache maintenance pass complete"
        ),
        _ => warn!(
            ?pressure,
            expired = report.expired_total(),
            flushed,
            "Cache maintenance under memory pressure"
        ),
    }

    report
}

/// Run [`run_maintenance_pass`] every `every` until shutdown, then flush once more
pub fn spawn_maintenance<V>(
    registry: Arc<CacheRegistry<V>>,
    monitor: Arc<ResourceMonitor>,
    every: Duration,
    mut shutdown: Shutdown,
) -> JoinHandle<()>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = ticker.tick() => {
                    run_maintenance_pass(&registry, &monitor).await;
                }
            }
        }

        let flushed = registry.flush_all().await;
        info!(flushed, "Flushed caches on shutdown");
    })
}
