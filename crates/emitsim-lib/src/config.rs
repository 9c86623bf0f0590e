//! Simulator configuration.
//!
//! Load order: JSON file (optional) → `EMITSIM_*` environment variables → defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub routing: RoutingConfig,
    pub allocation: AllocationConfig,
    pub broadcast: BroadcastConfig,
}

/// Route finding settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Margin added around the two route endpoints to bound the A* candidates.
    pub bbox_margin_km: f64,
    /// Whether the scan Dijkstra runs as the last fallback.
    pub enable_legacy_dijkstra: bool,
    /// Shortest path, in vertices, accepted by the scan Dijkstra fallback.
    pub min_meaningful_path: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            bbox_margin_km: 2.0,
            enable_legacy_dijkstra: true,
            min_meaningful_path: 3,
        }
    }
}

/// Resource allocation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    /// Gap left after a conflicting reservation by first-fit searches.
    pub epsilon_ms: i64,
    /// SQLite file holding persisted allocation tables.
    pub database: Option<PathBuf>,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            epsilon_ms: 1,
            database: None,
        }
    }
}

impl AllocationConfig {
    pub fn epsilon(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.epsilon_ms)
    }
}

/// Broadcaster settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Time compression factor; 1.0 is real time.
    pub speed: f64,
    /// Virtual time at which the queue starts; `None` means now.
    pub start_time: Option<DateTime<Utc>>,
    /// Popped entries later than this are dropped and trigger a trim.
    pub max_backlog_secs: f64,
    /// How long the sender sleeps on an empty queue before polling again.
    pub idle_poll_secs: f64,
    pub retry: RetryConfig,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            start_time: None,
            max_backlog_secs: 20.0,
            idle_poll_secs: 5.0,
            retry: RetryConfig::default(),
        }
    }
}

impl BroadcastConfig {
    pub fn idle_poll(&self) -> Duration {
        Duration::from_secs_f64(self.idle_poll_secs.max(0.0))
    }
}

/// Exponential backoff applied to queue substrate calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

/// Parse the variable into `target`, keeping the current value when parsing fails.
fn env_override<T, F>(lookup: &F, var: &str, target: &mut T)
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *target = value,
        Err(_) => tracing::warn!(variable = var, value = %raw, "ignoring unparsable override"),
    }
}

impl SimConfig {
    /// Read a JSON configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SimConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Defaults overlaid with `EMITSIM_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// File (if any), then environment overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_path(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overlay values looked up by environment variable name.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        env_override(&lookup, "EMITSIM_BBOX_MARGIN_KM", &mut self.routing.bbox_margin_km);
        env_override(&lookup, "EMITSIM_LEGACY_DIJKSTRA", &mut self.routing.enable_legacy_dijkstra);
        env_override(&lookup, "EMITSIM_MIN_MEANINGFUL_PATH", &mut self.routing.min_meaningful_path);
        env_override(&lookup, "EMITSIM_EPSILON_MS", &mut self.allocation.epsilon_ms);
        if let Some(database) = lookup("EMITSIM_DATABASE") {
            self.allocation.database = Some(PathBuf::from(database));
        }
        env_override(&lookup, "EMITSIM_SPEED", &mut self.broadcast.speed);
        if let Some(start) = lookup("EMITSIM_START_TIME") {
            match DateTime::parse_from_rfc3339(start.trim()) {
                Ok(parsed) => self.broadcast.start_time = Some(parsed.with_timezone(&Utc)),
                Err(err) => {
                    tracing::warn!(value = %start, error = %err, "ignoring unparsable start time")
                }
            }
        }
        env_override(&lookup, "EMITSIM_MAX_BACKLOG_SECS", &mut self.broadcast.max_backlog_secs);
        env_override(&lookup, "EMITSIM_IDLE_POLL_SECS", &mut self.broadcast.idle_poll_secs);
        env_override(&lookup, "EMITSIM_RETRY_ATTEMPTS", &mut self.broadcast.retry.max_attempts);
        env_override(&lookup, "EMITSIM_RETRY_BASE_DELAY_MS", &mut self.broadcast.retry.base_delay_ms);
        env_override(&lookup, "EMITSIM_RETRY_MAX_DELAY_MS", &mut self.broadcast.retry.max_delay_ms);
    }

    /// Reject values the simulator cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(self.broadcast.speed.is_finite() && self.broadcast.speed > 0.0) {
            return Err(Error::InvalidSpeed {
                speed: self.broadcast.speed,
            });
        }
        if self.broadcast.retry.max_attempts == 0 {
            return Err(Error::Config {
                message: "broadcast.retry.max_attempts must be at least 1".to_string(),
            });
        }
        if self.routing.bbox_margin_km < 0.0 {
            return Err(Error::Config {
                message: format!(
                    "routing.bbox_margin_km must not be negative, got {}",
                    self.routing.bbox_margin_km
                ),
            });
        }
        if self.allocation.epsilon_ms < 0 {
            return Err(Error::Config {
                message: "allocation.epsilon_ms must not be negative".to_string(),
            });
        }
        Ok(())
    }
}
