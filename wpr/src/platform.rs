// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interfaces to the controller services the routing core runs against.

use crate::error::InstallError;
use crate::types::{
    ConnectPoint, DeviceId, HostId, InstalledPath, Link, PathIntent,
};

/// Topology and host discovery.
pub trait Topology {
    /// Every device currently known.
    fn devices(&self) -> Vec<DeviceId>;

    /// Every known link, annotated with its current state.
    fn links(&self) -> Vec<Link>;

    /// Where a host attaches to the network.
    fn host_location(&self, host: &HostId) -> Option<ConnectPoint>;
}

/// Per-port traffic counters. Each value is the number of bytes moved since
/// the previous sample; `None` when the port has not been sampled.
pub trait PortStatistics {
    fn delta_sent(&self, cp: &ConnectPoint) -> Option<u64>;
    fn delta_received(&self, cp: &ConnectPoint) -> Option<u64>;
}

/// Programs forwarding state into the data plane. Both calls return as soon
/// as the request is accepted; data-plane confirmation is not awaited.
pub trait Installer {
    fn install(&self, intent: &PathIntent)
        -> Result<InstalledPath, InstallError>;
    fn revoke(&self, path: &InstalledPath) -> Result<(), InstallError>;
}

pub trait Platform:
    Topology + PortStatistics + Installer + Send + Sync + 'static
{
}

impl<T: Topology + PortStatistics + Installer + Send + Sync + 'static> Platform
    for T
{
}
