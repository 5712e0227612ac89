// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Flow to path lifecycle.
//!
//! The first arrival of a flow computes the current widest path between
//! its hosts and installs it. Later arrivals of the same flow are no-ops
//! until the installed path is evicted by the timeout scheduler.

use crate::error::FlowError;
use crate::graph::snapshot;
use crate::log::wpr_log;
use crate::metric::LinkMetrics;
use crate::platform::Platform;
use crate::timeout::TimeoutScheduler;
use crate::types::{DeviceId, FlowKey, HostId, InstalledPath, PathIntent};
use crate::widest::{widest_path, WidestPath};
use crate::MOD_FLOW;
use slog::Logger;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wpr_common::lock;

#[derive(Default)]
struct FlowTableData {
    installed: HashMap<FlowKey, InstalledPath>,

    /// Keys whose installation is in flight.
    reserved: HashSet<FlowKey>,
}

/// Installed paths by flow. A key is either absent, reserved while its
/// path is being installed, or installed; never more than one of these.
#[derive(Clone, Default)]
pub struct FlowTable {
    data: Arc<Mutex<FlowTableData>>,
}

impl FlowTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` is installed or being installed.
    pub fn contains(&self, key: &FlowKey) -> bool {
        let data = lock!(self.data);
        data.installed.contains_key(key) || data.reserved.contains(key)
    }

    pub fn is_installed(&self, key: &FlowKey) -> bool {
        lock!(self.data).installed.contains_key(key)
    }

    pub fn get(&self, key: &FlowKey) -> Option<InstalledPath> {
        lock!(self.data).installed.get(key).cloned()
    }

    /// Number of installed flows.
    pub fn len(&self) -> usize {
        lock!(self.data).installed.len()
    }

    pub fn is_empty(&self) -> bool {
        lock!(self.data).installed.is_empty()
    }

    /// Installed paths ordered by intent id.
    pub fn flows(&self) -> Vec<InstalledPath> {
        let mut flows: Vec<InstalledPath> =
            lock!(self.data).installed.values().cloned().collect();
        flows.sort_by_key(|p| p.id);
        flows
    }

    /// Claim `key` for installation. Fails if it is installed or already
    /// claimed.
    pub(crate) fn reserve(&self, key: &FlowKey) -> bool {
        let mut data = lock!(self.data);
        if data.installed.contains_key(key) {
            return false;
        }
        data.reserved.insert(key.clone())
    }

    pub(crate) fn release(&self, key: &FlowKey) {
        lock!(self.data).reserved.remove(key);
    }

    pub(crate) fn commit(&self, key: FlowKey, path: InstalledPath) {
        let mut data = lock!(self.data);
        data.reserved.remove(&key);
        data.installed.insert(key, path);
    }

    pub(crate) fn remove(&self, key: &FlowKey) -> Option<InstalledPath> {
        lock!(self.data).installed.remove(key)
    }

    /// Take every installed entry. Reservations are left alone; their
    /// owners finish and evict them.
    pub(crate) fn drain(&self) -> Vec<(FlowKey, InstalledPath)> {
        lock!(self.data).installed.drain().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    /// A path was computed and installed for this arrival.
    Installed(InstalledPath),

    /// The flow already has a path, or another arrival is installing one.
    AlreadyInstalled,
}

pub struct FlowManager<P: Platform> {
    platform: Arc<P>,
    metrics: LinkMetrics,
    table: FlowTable,
    scheduler: Arc<TimeoutScheduler<P>>,
    flow_timeout: Duration,
    shutting_down: AtomicBool,
    log: Logger,
}

impl<P: Platform> FlowManager<P> {
    pub fn new(
        platform: Arc<P>,
        metrics: LinkMetrics,
        table: FlowTable,
        scheduler: Arc<TimeoutScheduler<P>>,
        flow_timeout: Duration,
        log: Logger,
    ) -> Self {
        Self {
            platform,
            metrics,
            table,
            scheduler,
            flow_timeout,
            shutting_down: AtomicBool::new(false),
            log,
        }
    }

    pub fn platform(&self) -> &Arc<P> {
        &self.platform
    }

    pub fn table(&self) -> &FlowTable {
        &self.table
    }

    pub fn scheduler(&self) -> &TimeoutScheduler<P> {
        &self.scheduler
    }

    /// Widest path between two devices over the current topology.
    pub fn widest_path(
        &self,
        src: &DeviceId,
        dst: &DeviceId,
    ) -> Option<WidestPath> {
        let g = snapshot(self.platform.as_ref(), &self.metrics);
        widest_path(&g, src, dst)
    }

    /// Route a newly observed flow from `src` to `dst`.
    ///
    /// Safe to call concurrently, including for the same key: exactly one
    /// caller gets to install a path for a key, every other caller sees
    /// `AlreadyInstalled` until that path is evicted. On failure nothing is
    /// installed and the next arrival of the flow tries again.
    pub fn on_flow_arrival(
        &self,
        key: FlowKey,
        src: &HostId,
        dst: &HostId,
    ) -> Result<FlowOutcome, FlowError> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(FlowError::ShuttingDown);
        }
        if self.table.contains(&key) {
            wpr_log!(self.log, debug, MOD_FLOW, "flow already routed";
                "flow" => key.to_string()
            );
            return Ok(FlowOutcome::AlreadyInstalled);
        }

        let ingress = self
            .platform
            .host_location(src)
            .ok_or_else(|| FlowError::UnknownHost(src.clone()))?;
        let egress = self
            .platform
            .host_location(dst)
            .ok_or_else(|| FlowError::UnknownHost(dst.clone()))?;

        let path = self
            .widest_path(&ingress.device, &egress.device)
            .ok_or_else(|| FlowError::NoPath {
                src: ingress.device.clone(),
                dst: egress.device.clone(),
            })?;

        // Another arrival for this key may have got here first while the
        // path was being computed. The loser drops its path untouched.
        if !self.table.reserve(&key) {
            wpr_log!(self.log, debug, MOD_FLOW,
                "lost installation race, discarding path";
                "flow" => key.to_string()
            );
            return Ok(FlowOutcome::AlreadyInstalled);
        }

        let intent = PathIntent {
            key: key.clone(),
            ingress,
            egress,
            links: path.links,
            bottleneck: path.bottleneck,
        };
        let installed = match self.platform.install(&intent) {
            Ok(installed) => installed,
            Err(e) => {
                self.table.release(&key);
                wpr_log!(self.log, debug, MOD_FLOW, "install failed: {}", e;
                    "flow" => key.to_string()
                );
                return Err(e.into());
            }
        };

        self.table.commit(key.clone(), installed.clone());
        wpr_log!(self.log, info, MOD_FLOW,
            "installed {} hop path, bottleneck {}",
            intent.links.len(),
            intent.bottleneck;
            "flow" => key.to_string(),
            "intent" => installed.id.to_string()
        );

        // Shutdown may have drained the table while this install was in
        // flight; if so nobody else will evict this entry.
        let delay = if self.shutting_down.load(Ordering::SeqCst) {
            Duration::ZERO
        } else {
            self.flow_timeout
        };
        self.scheduler.schedule(key, delay);

        Ok(FlowOutcome::Installed(installed))
    }

    /// Refuse new arrivals, stop the eviction clock and evict every
    /// installed flow. Returns the number of flows evicted.
    pub fn shutdown(&self) -> usize {
        self.shutting_down.store(true, Ordering::SeqCst);
        self.scheduler.stop();
        self.scheduler.drain()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::InstallError;
    use crate::test::{
        device, host, link, metrics, triangle, triangle_capacity,
        MockPlatform,
    };
    use crate::types::{Bandwidth, Criterion, LinkState};
    use pretty_assertions::assert_eq;
    use std::thread;

    fn key() -> FlowKey {
        FlowKey::new([
            Criterion::EthType(0x0800),
            Criterion::Ipv4Src("10.0.0.1".parse().unwrap()),
            Criterion::Ipv4Dst("10.0.0.2".parse().unwrap()),
        ])
    }

    fn manager(p: Arc<MockPlatform>) -> FlowManager<MockPlatform> {
        let log = wpr_common::log::test_logger();
        let table = FlowTable::new();
        let scheduler = Arc::new(TimeoutScheduler::new(
            Duration::from_millis(10),
            table.clone(),
            p.clone(),
            log.clone(),
        ));
        FlowManager::new(
            p,
            metrics(triangle_capacity()),
            table,
            scheduler,
            Duration::from_secs(10),
            log,
        )
    }

    fn routed() -> (Arc<MockPlatform>, FlowManager<MockPlatform>) {
        let p = Arc::new(MockPlatform::default());
        triangle(&p);
        let m = manager(p.clone());
        (p, m)
    }

    #[test]
    fn installs_widest_path() {
        let (p, m) = routed();
        let out = m.on_flow_arrival(key(), &host("h1"), &host("h2")).unwrap();
        let FlowOutcome::Installed(path) = out else {
            panic!("expected install, got {out:?}");
        };
        assert_eq!(path.links, vec![link(1, 2)]);
        assert_eq!(m.table().get(&key()), Some(path));

        let installs = wpr_common::lock!(p.installs).clone();
        assert_eq!(installs.len(), 1);
        assert_eq!(installs[0].ingress, crate::test::cp(1, 0));
        assert_eq!(installs[0].egress, crate::test::cp(2, 0));
        assert_eq!(installs[0].bottleneck, Bandwidth::from_kbps(10_000));
        assert_eq!(
            m.scheduler().remaining(&key()),
            Some(Duration::from_secs(10))
        );
    }

    #[test]
    fn install_finishing_after_shutdown_is_evicted() {
        let p = Arc::new(MockPlatform::with_install_gate());
        triangle(&p);
        let m = Arc::new(manager(p.clone()));

        let arrival = {
            let m = m.clone();
            thread::spawn(move || {
                m.on_flow_arrival(key(), &host("h1"), &host("h2"))
            })
        };

        // the arrival is now inside install with its key reserved
        p.gate();
        assert_eq!(m.shutdown(), 0);
        p.gate();

        let out = arrival.join().unwrap().unwrap();
        assert!(matches!(out, FlowOutcome::Installed(_)));
        assert!(m.table().is_empty());
        assert!(!m.table().contains(&key()));
        assert_eq!(m.scheduler().pending(), 0);
        assert_eq!(p.install_count(), 1);
        assert_eq!(p.revoke_count(), 1);
        assert_eq!(p.live_count(), 0);
    }

    #[test]
    fn repeated_arrival_is_noop() {
        let (p, m) = routed();
        m.on_flow_arrival(key(), &host("h1"), &host("h2")).unwrap();

        // same criteria in a different order
        let again = FlowKey::new(key().criteria().iter().rev().copied());
        let out = m.on_flow_arrival(again, &host("h1"), &host("h2")).unwrap();
        assert_eq!(out, FlowOutcome::AlreadyInstalled);
        assert_eq!(p.install_count(), 1);
        assert_eq!(m.table().len(), 1);
    }

    #[test]
    fn distinct_flows_get_distinct_paths() {
        let (p, m) = routed();
        m.on_flow_arrival(key(), &host("h1"), &host("h2")).unwrap();
        let reverse = FlowKey::new([Criterion::EthType(0x86dd)]);
        m.on_flow_arrival(reverse, &host("h2"), &host("h1")).unwrap();
        assert_eq!(p.install_count(), 2);
        assert_eq!(m.table().len(), 2);
        assert_eq!(m.table().flows()[1].links, vec![link(2, 1)]);
    }

    #[test]
    fn inactive_link_is_avoided() {
        let (p, m) = routed();
        p.set_state(1, 2, LinkState::Inactive);
        let out = m.on_flow_arrival(key(), &host("h1"), &host("h2")).unwrap();
        let FlowOutcome::Installed(path) = out else {
            panic!("expected install, got {out:?}");
        };
        assert_eq!(path.links, vec![link(1, 3), link(3, 2)]);
    }

    #[test]
    fn no_path_installs_nothing() {
        let (p, m) = routed();
        p.set_state(1, 2, LinkState::Inactive);
        p.set_state(1, 3, LinkState::Inactive);
        let err = m
            .on_flow_arrival(key(), &host("h1"), &host("h2"))
            .unwrap_err();
        assert_eq!(
            err,
            FlowError::NoPath {
                src: device(1),
                dst: device(2)
            }
        );
        assert_eq!(p.install_count(), 0);
        assert!(!m.table().contains(&key()));
    }

    #[test]
    fn unknown_host() {
        let (p, m) = routed();
        let err = m
            .on_flow_arrival(key(), &host("h1"), &host("h9"))
            .unwrap_err();
        assert_eq!(err, FlowError::UnknownHost(host("h9")));
        assert_eq!(p.install_count(), 0);
    }

    #[test]
    fn install_failure_allows_retry() {
        let (p, m) = routed();
        *wpr_common::lock!(p.install_error) =
            Some(InstallError::Unavailable("intent service down".into()));
        let err = m
            .on_flow_arrival(key(), &host("h1"), &host("h2"))
            .unwrap_err();
        assert!(matches!(err, FlowError::Install(_)));
        assert!(!m.table().contains(&key()));
        assert_eq!(m.scheduler().pending(), 0);

        *wpr_common::lock!(p.install_error) = None;
        let out = m.on_flow_arrival(key(), &host("h1"), &host("h2")).unwrap();
        assert!(matches!(out, FlowOutcome::Installed(_)));
        assert_eq!(p.install_count(), 1);
    }

    #[test]
    fn failure_does_not_touch_other_flows() {
        let (p, m) = routed();
        m.on_flow_arrival(key(), &host("h1"), &host("h2")).unwrap();
        let other = FlowKey::new([Criterion::EthType(0x86dd)]);
        assert!(m.on_flow_arrival(other, &host("h1"), &host("nope")).is_err());
        assert!(m.table().is_installed(&key()));
        assert_eq!(p.install_count(), 1);
    }

    #[test]
    fn concurrent_arrivals_install_once() {
        let p = Arc::new(MockPlatform::with_barrier(2));
        triangle(&p);
        let m = Arc::new(manager(p.clone()));

        // both threads are held inside the topology read, so both compute
        // a path before either tries to claim the key
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let m = m.clone();
                thread::spawn(move || {
                    m.on_flow_arrival(key(), &host("h1"), &host("h2"))
                })
            })
            .collect();
        let outcomes: Vec<FlowOutcome> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();

        let installed = outcomes
            .iter()
            .filter(|o| matches!(o, FlowOutcome::Installed(_)))
            .count();
        assert_eq!(installed, 1);
        assert!(outcomes.contains(&FlowOutcome::AlreadyInstalled));
        assert_eq!(p.install_count(), 1);
        assert_eq!(m.table().len(), 1);
    }

    #[test]
    fn evicted_flow_can_be_reinstalled() {
        let (p, m) = routed();
        m.on_flow_arrival(key(), &host("h1"), &host("h2")).unwrap();
        m.scheduler().tick(Duration::from_secs(10));
        assert!(!m.table().contains(&key()));
        assert_eq!(p.revoke_count(), 1);

        let out = m.on_flow_arrival(key(), &host("h1"), &host("h2")).unwrap();
        assert!(matches!(out, FlowOutcome::Installed(_)));
        assert_eq!(p.install_count(), 2);
        assert_eq!(p.live_count(), 1);
    }

    #[test]
    fn shutdown_drains_and_refuses() {
        let (p, m) = routed();
        m.on_flow_arrival(key(), &host("h1"), &host("h2")).unwrap();
        m.on_flow_arrival(
            FlowKey::new([Criterion::EthType(0x86dd)]),
            &host("h2"),
            &host("h1"),
        )
        .unwrap();

        assert_eq!(m.shutdown(), 2);
        assert!(m.table().is_empty());
        assert_eq!(p.revoke_count(), 2);
        assert_eq!(p.live_count(), 0);
        assert_eq!(
            m.on_flow_arrival(key(), &host("h1"), &host("h2")),
            Err(FlowError::ShuttingDown)
        );
    }
}
