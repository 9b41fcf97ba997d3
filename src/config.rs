//! Configuration types for autobatch

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning knobs for a batch run
///
/// A [`BatchRunner`](crate::BatchRunner) is created with a base `BatchConfig`; every run merges
/// its [`ConfigOverrides`] on top of it and keeps the merged copy in its session state. Only
/// `batch_size` changes during a run (adaptive sizing writes the revised value back).
///
/// Durations are (de)serialized as integer milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of items per batch (default: 5)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum number of retries per batch (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before a failed batch is retried (default: 5000 ms)
    #[serde(default = "default_retry_delay", with = "duration_ms_serde")]
    pub retry_delay: Duration,

    /// Delay between two consecutive batches (default: 2000 ms)
    #[serde(default = "default_download_delay", with = "duration_ms_serde")]
    pub download_delay: Duration,

    /// Revise the batch size from observed success rate and latency (default: true)
    #[serde(default = "default_true")]
    pub auto_adjust_batch_size: bool,

    /// Lower bound for adaptive sizing (default: 1)
    #[serde(default = "default_min_batch_size")]
    pub min_batch_size: usize,

    /// Upper bound for adaptive sizing (default: 20)
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Per-request timeout handed to the fetcher on every batch of the run (default: 30000 ms)
    #[serde(default = "default_network_timeout", with = "duration_ms_serde")]
    pub network_timeout_threshold: Duration,

    /// Success rate below which adaptive sizing shrinks batches (default: 0.8)
    #[serde(default = "default_success_rate_threshold")]
    pub success_rate_threshold: f64,

    /// How often a paused run checks whether it was resumed (default: 1000 ms)
    #[serde(default = "default_pause_poll_interval", with = "duration_ms_serde")]
    pub pause_poll_interval: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            download_delay: default_download_delay(),
            auto_adjust_batch_size: true,
            min_batch_size: default_min_batch_size(),
            max_batch_size: default_max_batch_size(),
            network_timeout_threshold: default_network_timeout(),
            success_rate_threshold: default_success_rate_threshold(),
            pause_poll_interval: default_pause_poll_interval(),
        }
    }
}

impl BatchConfig {
    /// Check the invariants the runner relies on.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::config("batch_size", "batch_size must be at least 1"));
        }
        if self.min_batch_size == 0 {
            return Err(Error::config(
                "min_batch_size",
                "min_batch_size must be at least 1",
            ));
        }
        if self.min_batch_size > self.max_batch_size {
            return Err(Error::config(
                "max_batch_size",
                format!(
                    "max_batch_size ({}) must not be smaller than min_batch_size ({})",
                    self.max_batch_size, self.min_batch_size
                ),
            ));
        }
        if !(0.0..=1.0).contains(&self.success_rate_threshold) {
            return Err(Error::config(
                "success_rate_threshold",
                format!(
                    "success_rate_threshold must be between 0.0 and 1.0, got {}",
                    self.success_rate_threshold
                ),
            ));
        }
        if self.pause_poll_interval.is_zero() {
            return Err(Error::config(
                "pause_poll_interval",
                "pause_poll_interval must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Return a copy of this config with every set override applied.
    pub fn with_overrides(&self, overrides: &ConfigOverrides) -> Self {
        Self {
            batch_size: overrides.batch_size.unwrap_or(self.batch_size),
            max_retries: overrides.max_retries.unwrap_or(self.max_retries),
            retry_delay: overrides.retry_delay.unwrap_or(self.retry_delay),
            download_delay: overrides.download_delay.unwrap_or(self.download_delay),
            auto_adjust_batch_size: overrides
                .auto_adjust_batch_size
                .unwrap_or(self.auto_adjust_batch_size),
            min_batch_size: overrides.min_batch_size.unwrap_or(self.min_batch_size),
            max_batch_size: overrides.max_batch_size.unwrap_or(self.max_batch_size),
            network_timeout_threshold: overrides
                .network_timeout_threshold
                .unwrap_or(self.network_timeout_threshold),
            success_rate_threshold: overrides
                .success_rate_threshold
                .unwrap_or(self.success_rate_threshold),
            pause_poll_interval: overrides
                .pause_poll_interval
                .unwrap_or(self.pause_poll_interval),
        }
    }
}

/// Per-run overrides for [`BatchConfig`]
///
/// Every field is optional; unset fields keep the runner's base value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigOverrides {
    /// Items per batch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,

    /// Maximum retries per batch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    /// Delay before retrying a failed batch
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_duration_ms_serde"
    )]
    pub retry_delay: Option<Duration>,

    /// Delay between batches
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_duration_ms_serde"
    )]
    pub download_delay: Option<Duration>,

    /// Enable or disable adaptive sizing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_adjust_batch_size: Option<bool>,

    /// Lower bound for adaptive sizing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_batch_size: Option<usize>,

    /// Upper bound for adaptive sizing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_batch_size: Option<usize>,

    /// Per-request network timeout
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_duration_ms_serde"
    )]
    pub network_timeout_threshold: Option<Duration>,

    /// Success rate threshold for shrinking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_rate_threshold: Option<f64>,

    /// Pause poll interval
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_duration_ms_serde"
    )]
    pub pause_poll_interval: Option<Duration>,
}

// Default value functions
fn default_batch_size() -> usize {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(5000)
}

fn default_download_delay() -> Duration {
    Duration::from_millis(2000)
}

fn default_true() -> bool {
    true
}

fn default_min_batch_size() -> usize {
    1
}

fn default_max_batch_size() -> usize {
    20
}

fn default_network_timeout() -> Duration {
    Duration::from_millis(30_000)
}

fn default_success_rate_threshold() -> f64 {
    0.8
}

fn default_pause_poll_interval() -> Duration {
    Duration::from_millis(1000)
}

// Duration serialization helper (milliseconds)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// Optional Duration serialization helper (milliseconds)
mod optional_duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
