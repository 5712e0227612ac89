// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Remaining bandwidth of a link, derived from its configured capacity and
//! the traffic counters of its endpoints. All rates are in Mbps.

use crate::capacity::{CapacityMatrix, DeviceIndexer};
use crate::config::MetricMode;
use crate::log::wpr_log;
use crate::platform::PortStatistics;
use crate::types::{Bandwidth, Link};
use crate::MOD_METRIC;
use slog::Logger;
use std::sync::Arc;
use std::time::Duration;

/// Convert a byte count collected over `interval` into Mbps, with a
/// megabit being 1024 * 1024 bits.
///
/// The interval is the configured sampling interval, not the duration the
/// counters report: those durations have been observed to be zero or off
/// by a whole second, so a fixed interval is the better approximation.
pub fn sample_rate(bytes: u64, interval: Duration) -> f64 {
    let secs = interval.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    bytes as f64 * 8.0 / (secs * 1024.0 * 1024.0)
}

#[derive(Clone)]
pub struct LinkMetrics {
    capacity: Arc<CapacityMatrix>,
    indexer: DeviceIndexer,
    sample_interval: Duration,
    mode: MetricMode,
    log: Logger,
}

impl LinkMetrics {
    pub fn new(
        capacity: Arc<CapacityMatrix>,
        indexer: DeviceIndexer,
        sample_interval: Duration,
        mode: MetricMode,
        log: Logger,
    ) -> Self {
        Self {
            capacity,
            indexer,
            sample_interval,
            mode,
            log,
        }
    }

    pub fn capacity(&self, link: &Link) -> f64 {
        if !link.is_active() {
            return 0.0;
        }
        let src = self.indexer.index(&link.src.device);
        let dst = self.indexer.index(&link.dst.device);
        match (src, dst) {
            (Ok(src), Ok(dst)) => self.capacity.get(src, dst),
            (Err(e), _) | (_, Err(e)) => {
                wpr_log!(self.log, warn, MOD_METRIC,
                    "no capacity for {}: {}", link, e;
                    "link" => link.to_string()
                );
                0.0
            }
        }
    }

    /// The larger of what the source port sent and what the destination
    /// port received during the last sample.
    pub fn usage<S: PortStatistics + ?Sized>(
        &self,
        stats: &S,
        link: &Link,
    ) -> f64 {
        if !link.is_active() || self.mode == MetricMode::Static {
            return 0.0;
        }
        let sent = stats
            .delta_sent(&link.src)
            .map(|b| sample_rate(b, self.sample_interval))
            .unwrap_or(0.0);
        let received = stats
            .delta_received(&link.dst)
            .map(|b| sample_rate(b, self.sample_interval))
            .unwrap_or(0.0);
        sent.max(received)
    }

    pub fn remaining<S: PortStatistics + ?Sized>(
        &self,
        stats: &S,
        link: &Link,
    ) -> f64 {
        if !link.is_active() {
            return 0.0;
        }
        (self.capacity(link) - self.usage(stats, link)).max(0.0)
    }

    /// Remaining bandwidth as a graph weight.
    pub fn weight<S: PortStatistics + ?Sized>(
        &self,
        stats: &S,
        link: &Link,
    ) -> Bandwidth {
        let w = Bandwidth::from_mbps(self.remaining(stats, link));
        wpr_log!(self.log, trace, MOD_METRIC, "weight {}", w;
            "link" => link.to_string()
        );
        w
    }
}
