use std::path::PathBuf;
use std::time::Duration;

use crate::model::{HOUR_MS, MINUTE_MS, Ms};

/// Business rules applied by the booking pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingPolicy {
    /// Symmetric turnover padding applied to the requested window during
    /// conflict checks only. Never persisted, never shown to callers.
    pub buffer_ms: Ms,
    /// Longest window a single booking may cover.
    pub max_duration_ms: Ms,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            buffer_ms: 0,
            max_duration_ms: 8 * HOUR_MS,
        }
    }
}

impl BookingPolicy {
    pub fn with_buffer_minutes(minutes: i64) -> Self {
        Self {
            buffer_ms: minutes * MINUTE_MS,
            ..Self::default()
        }
    }
}

/// Runtime configuration, read from `ATRIUM_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub policy: BookingPolicy,
    /// Cadence of the status housekeeping task.
    pub housekeeping_interval: Duration,
    /// WAL appends between compactions.
    pub compact_threshold: u64,
    /// Prometheus exporter port; None disables metrics.
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            policy: BookingPolicy::default(),
            housekeeping_interval: Duration::from_secs(5),
            compact_threshold: 1000,
            metrics_port: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let data_dir = std::env::var("ATRIUM_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        // 60 minutes of turnover between meetings unless overridden.
        let buffer_minutes: i64 = env_parse("ATRIUM_BUFFER_MINUTES", 60);
        let max_duration_hours: i64 = env_parse("ATRIUM_MAX_DURATION_HOURS", 8);

        Self {
            data_dir,
            policy: BookingPolicy {
                buffer_ms: buffer_minutes * MINUTE_MS,
                max_duration_ms: max_duration_hours * HOUR_MS,
            },
            housekeeping_interval: Duration::from_secs(env_parse(
                "ATRIUM_HOUSEKEEPING_SECS",
                5,
            )),
            compact_threshold: env_parse("ATRIUM_COMPACT_THRESHOLD", 1000),
            metrics_port: std::env::var("ATRIUM_METRICS_PORT")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
