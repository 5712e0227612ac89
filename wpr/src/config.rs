// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::error::ConfigError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How link weights are derived.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum MetricMode {
    /// Configured capacity minus sampled usage.
    #[default]
    Dynamic,

    /// Configured capacity only; traffic counters are never read.
    Static,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    /// Capacity table, one `<src> <dst> <mbps>` entry per line.
    pub capacity_file: PathBuf,

    /// Prefix stripped from a device id before parsing its index.
    pub device_prefix: String,

    /// Radix of the index that follows the prefix.
    pub device_index_radix: u32,

    /// Interval the traffic counters are assumed to cover. The counters'
    /// own duration fields are unreliable, so this is a fixed approximation
    /// rather than a measurement.
    pub sample_interval_secs: f64,

    /// Lifetime of an installed path.
    pub flow_timeout_secs: u64,

    /// Tick period of the eviction clock.
    pub timer_resolution_ms: u64,

    pub metric_mode: MetricMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity_file: PathBuf::from("capacity.txt"),
            device_prefix: crate::DEFAULT_DEVICE_PREFIX.to_owned(),
            device_index_radix: crate::DEFAULT_DEVICE_INDEX_RADIX,
            sample_interval_secs: crate::DEFAULT_SAMPLE_INTERVAL_SECS,
            flow_timeout_secs: crate::DEFAULT_FLOW_TIMEOUT_SECS,
            timer_resolution_ms: crate::DEFAULT_TIMER_RESOLUTION_MS,
            metric_mode: MetricMode::default(),
        }
    }
}

impl Config {
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        let cfg: Config = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).map_err(|source| {
            ConfigError::Io {
                path: path.display().to_string(),
                source,
            }
        })?;
        Self::from_json(&s)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(2..=36).contains(&self.device_index_radix) {
            return Err(ConfigError::Invalid(format!(
                "device_index_radix {} not in 2..=36",
                self.device_index_radix
            )));
        }
        if self.sample_interval_secs <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "sample_interval_secs {} must be positive",
                self.sample_interval_secs
            )));
        }
        if let Err(e) = Duration::try_from_secs_f64(self.sample_interval_secs)
        {
            return Err(ConfigError::Invalid(format!(
                "sample_interval_secs {}: {e}",
                self.sample_interval_secs
            )));
        }
        if self.flow_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "flow_timeout_secs must be positive".into(),
            ));
        }
        if self.timer_resolution_ms == 0 {
            return Err(ConfigError::Invalid(
                "timer_resolution_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Falls back to the default interval when the setting does not pass
    /// `validate`.
    pub fn sample_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.sample_interval_secs)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or(Duration::from_secs_f64(
                crate::DEFAULT_SAMPLE_INTERVAL_SECS,
            ))
    }

    pub fn flow_timeout(&self) -> Duration {
        Duration::from_secs(self.flow_timeout_secs)
    }

    pub fn timer_resolution(&self) -> Duration {
        Duration::from_millis(self.timer_resolution_ms)
    }
}
