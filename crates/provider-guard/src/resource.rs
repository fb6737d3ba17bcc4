//! Memory and thermal monitoring
//!
//! Samples process memory and CPU temperature on demand. Thermal gating
//! uses hysteresis: the monitor starts pausing above the high-water mark
//! and keeps pausing until the temperature falls below the low-water mark.

use crate::config::ResourceConfig;
use crate::error::ConfigError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::time::Instant;
use tracing::{info, warn};

const PROC_STATUS: &str = "/proc/self/status";
const THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceSnapshot {
    pub memory_used_bytes: u64,
    pub cpu_temperature_celsius: f64,
    pub sampled_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MemoryPressure {
    Normal,
    /// Caches should sweep expired entries
    Warning,
    /// New cache insertions are refused
    Critical,
}

/// Source of raw resource readings
#[async_trait]
pub trait ResourceProbe: Send + Sync {
    async fn memory_used_bytes(&self) -> u64;
    async fn cpu_temperature_celsius(&self) -> f64;
}

/// Reads the Linux procfs/sysfs files
///
/// Hosts without a thermal zone (or without procfs) read as 0, which never
/// triggers a pause or memory pressure.
#[derive(Debug, Clone)]
pub struct SystemProbe {
    status_path: PathBuf,
    thermal_path: PathBuf,
}

impl SystemProbe {
    pub fn new() -> Self {
        Self::with_paths(PROC_STATUS, THERMAL_ZONE)
    }

    pub fn with_paths(status_path: impl Into<PathBuf>, thermal_path: impl Into<PathBuf>) -> Self {
        Self {
            status_path: status_path.into(),
            thermal_path: thermal_path.into(),
        }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceProbe for SystemProbe {
    async fn memory_used_bytes(&self) -> u64 {
        tokio::fs::read_to_string(&self.status_path)
            .await
            .ok()
            .and_then(|status| parse_vm_rss(&status))
            .unwrap_or(0)
    }

    async fn cpu_temperature_celsius(&self) -> f64 {
        tokio::fs::read_to_string(&self.thermal_path)
            .await
            .ok()
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .map(|millidegrees| millidegrees / 1000.0)
            .unwrap_or(0.0)
    }
}

/// Resident set size from a `/proc/<pid>/status` document, in bytes
fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status.lines().find(|line| line.starts_with("VmRSS:"))?;
    let kb = line.split_whitespace().nth(1)?.parse::<u64>().ok()?;
    Some(kb * 1024)
}

pub struct ResourceMonitor {
    config: ResourceConfig,
    probe: Box<dyn ResourceProbe>,
    paused: AtomicBool,
}

impl ResourceMonitor {
    /// Monitor backed by the system probe
    pub fn new(config: ResourceConfig) -> Result<Self, ConfigError> {
        Self::with_probe(config, SystemProbe::new())
    }

    pub fn with_probe(
        config: ResourceConfig,
        probe: impl ResourceProbe + 'static,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            probe: Box::new(probe),
            paused: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    pub async fn sample(&self) -> ResourceSnapshot {
        ResourceSnapshot {
            memory_used_bytes: self.probe.memory_used_bytes().await,
            cpu_temperature_celsius: self.probe.cpu_temperature_celsius().await,
            sampled_at: Instant::now(),
        }
    }

    /// Whether calls should wait for the CPU to cool down
    pub async fn should_pause(&self) -> bool {
        let celsius = self.probe.cpu_temperature_celsius().await;
        let was_paused = self.paused.load(Ordering::Relaxed);

        let pause = if was_paused {
            celsius >= self.config.thermal_low_c
        } else {
            celsius > self.config.thermal_high_c
        };

        if pause != was_paused {
            self.paused.store(pause, Ordering::Relaxed);
            if pause {
                warn!(
                    celsius,
                    high_water = self.config.thermal_high_c,
                    "CPU temperature high, pausing provider calls"
                );
            } else {
                info!(
                    celsius,
                    low_water = self.config.thermal_low_c,
                    "CPU cooled down, resuming provider calls"
                );
            }
        }

        pause
    }

    /// Last temperature reading, for error reporting
    pub async fn cpu_temperature_celsius(&self) -> f64 {
        self.probe.cpu_temperature_celsius().await
    }

    pub async fn memory_pressure(&self) -> MemoryPressure {
        self.pressure_for(self.probe.memory_used_bytes().await)
    }

    pub fn pressure_for(&self, memory_used_bytes: u64) -> MemoryPressure {
        if memory_used_bytes > self.config.memory_critical_bytes {
            MemoryPressure::Critical
        } else if memory_used_bytes > self.config.memory_warning_bytes {
            MemoryPressure::Warning
        } else {
            MemoryPressure::Normal
        }
    }
}
