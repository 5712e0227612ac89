// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Application lifecycle: activation, flow event handling, deactivation.

use crate::capacity::{CapacityMatrix, DeviceIndexer};
use crate::config::Config;
use crate::error::{Error, FlowError};
use crate::flow::{FlowManager, FlowOutcome, FlowTable};
use crate::log::wpr_log;
use crate::metric::LinkMetrics;
use crate::platform::Platform;
use crate::timeout::TimeoutScheduler;
use crate::types::{FlowEvent, HostId, InstalledPath};
use crate::widest::WidestPath;
use crate::MOD_APP;
use slog::Logger;
use std::sync::Arc;

pub struct WidestPathRouting<P: Platform> {
    manager: FlowManager<P>,
    log: Logger,
}

impl<P: Platform> WidestPathRouting<P> {
    /// Load the capacity table named by `config` and start routing. Any
    /// configuration problem aborts activation; routing never starts
    /// without a capacity table.
    pub fn activate(
        config: &Config,
        platform: Arc<P>,
        log: Logger,
    ) -> Result<Self, Error> {
        config.validate()?;
        let capacity = match CapacityMatrix::load(&config.capacity_file) {
            Ok(c) => c,
            Err(e) => {
                wpr_log!(log, error, MOD_APP,
                    "cannot read capacities: {}", e;
                    "path" => config.capacity_file.display().to_string()
                );
                return Err(e.into());
            }
        };
        Self::with_capacity(config, Arc::new(capacity), platform, log)
    }

    /// Start routing with an already loaded capacity table.
    pub fn with_capacity(
        config: &Config,
        capacity: Arc<CapacityMatrix>,
        platform: Arc<P>,
        log: Logger,
    ) -> Result<Self, Error> {
        config.validate()?;
        let indexer = DeviceIndexer::new(
            config.device_prefix.clone(),
            config.device_index_radix,
        )?;
        if let Err(e) = capacity.validate_topology(
            &indexer,
            &platform.devices(),
            &platform.links(),
        ) {
            wpr_log!(log, error, MOD_APP,
                "capacity table does not cover topology: {}", e);
            return Err(e.into());
        }

        let metrics = LinkMetrics::new(
            capacity.clone(),
            indexer,
            config.sample_interval(),
            config.metric_mode,
            log.clone(),
        );
        let table = FlowTable::new();
        let scheduler = Arc::new(TimeoutScheduler::new(
            config.timer_resolution(),
            table.clone(),
            platform.clone(),
            log.clone(),
        ));
        scheduler.start();
        let manager = FlowManager::new(
            platform,
            metrics,
            table,
            scheduler,
            config.flow_timeout(),
            log.clone(),
        );

        wpr_log!(log, info, MOD_APP, "started";
            "capacities" => capacity.len(),
            "flow_timeout_secs" => config.flow_timeout_secs
        );
        Ok(Self { manager, log })
    }

    /// Handle a new-flow notification. Failures are logged here and only
    /// concern this flow.
    pub fn handle(&self, event: &FlowEvent) -> Result<FlowOutcome, FlowError> {
        let result = self.manager.on_flow_arrival(
            event.key.clone(),
            &event.src,
            &event.dst,
        );
        if let Err(e) = &result {
            wpr_log!(self.log, warn, MOD_APP, "routing failed: {}", e;
                "flow" => event.key.to_string(),
                "src" => event.src.to_string(),
                "dst" => event.dst.to_string()
            );
        }
        result
    }

    /// The path a flow between two hosts would take right now. Nothing is
    /// installed.
    pub fn path_between(
        &self,
        src: &HostId,
        dst: &HostId,
    ) -> Result<WidestPath, FlowError> {
        let platform = self.manager.platform();
        let ingress = platform
            .host_location(src)
            .ok_or_else(|| FlowError::UnknownHost(src.clone()))?;
        let egress = platform
            .host_location(dst)
            .ok_or_else(|| FlowError::UnknownHost(dst.clone()))?;
        self.manager
            .widest_path(&ingress.device, &egress.device)
            .ok_or(FlowError::NoPath {
                src: ingress.device,
                dst: egress.device,
            })
    }

    pub fn flows(&self) -> Vec<InstalledPath> {
        self.manager.table().flows()
    }

    pub fn manager(&self) -> &FlowManager<P> {
        &self.manager
    }

    /// Stop routing and evict every installed flow. Returns the number of
    /// flows evicted.
    pub fn deactivate(self) -> usize {
        let n = self.manager.shutdown();
        wpr_log!(self.log, info, MOD_APP, "stopped"; "evicted" => n);
        n
    }
}
