// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Widest-path routing core.
//!
//! Flows are routed over the path whose narrowest link has the most
//! remaining bandwidth. Link weights are derived from a static capacity
//! table and live traffic counters, recomputed on every flow arrival.
//! Installed paths are tracked per flow and evicted after a timeout or when
//! the application is deactivated.

pub mod app;
pub mod capacity;
pub mod config;
pub mod error;
pub mod flow;
pub mod graph;
pub mod log;
pub mod metric;
pub mod platform;
pub mod timeout;
pub mod types;
pub mod widest;

pub use app::WidestPathRouting;
pub use capacity::{CapacityMatrix, DeviceIndexer};
pub use config::{Config, MetricMode};
pub use error::{ConfigError, Error, FlowError, InstallError};
pub use flow::{FlowManager, FlowOutcome, FlowTable};
pub use graph::Graph;
pub use metric::LinkMetrics;
pub use platform::{Installer, Platform, PortStatistics, Topology};
pub use timeout::TimeoutScheduler;
pub use types::*;
pub use widest::{widest_path, WidestPath};

#[cfg(test)]
mod proptest;


pub const COMPONENT_WPR: &str = "wpr";
pub const MOD_METRIC: &str = "metric";
pub const MOD_FLOW: &str = "flow";
pub const MOD_TIMEOUT: &str = "timeout";
pub const MOD_APP: &str = "app";

/// Device identifiers are expected to look like `of:<datapath id>`.
pub const DEFAULT_DEVICE_PREFIX: &str = "of:";

/// OpenFlow datapath ids are hexadecimal.
pub const DEFAULT_DEVICE_INDEX_RADIX: u32 = 16;

/// Assumed interval between traffic counter samples, in seconds.
pub const DEFAULT_SAMPLE_INTERVAL_SECS: f64 = 5.0;

/// How long an installed path lives before it is evicted, in seconds.
pub const DEFAULT_FLOW_TIMEOUT_SECS: u64 = 10;

/// Tick period of the eviction clock, in milliseconds.
pub const DEFAULT_TIMER_RESOLUTION_MS: u64 = 100;
