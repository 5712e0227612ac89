// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::metric::LinkMetrics;
use crate::platform::{PortStatistics, Topology};
use crate::types::{Bandwidth, DeviceId, Link};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Edge {
    pub link: Link,
    pub weight: Bandwidth,
}

/// Directed graph of devices. Edges out of a vertex are kept in insertion
/// order, which the widest path search relies on for deterministic tie
/// breaking.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
pub struct Graph {
    // a -> [(a -> b @ weight)]
    pub adj: BTreeMap<DeviceId, Vec<Edge>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_edge_list<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = (Link, Bandwidth)>,
    {
        let mut g = Self::new();
        for (link, weight) in edges {
            g.add_edge(link, weight);
        }
        g
    }

    pub fn add_vertex(&mut self, d: DeviceId) {
        self.adj.entry(d).or_default();
    }

    /// Add a directed edge along `link`, adding its endpoints as vertices
    /// if they are not already present.
    pub fn add_edge(&mut self, link: Link, weight: Bandwidth) {
        self.add_vertex(link.dst.device.clone());
        self.adj
            .entry(link.src.device.clone())
            .or_default()
            .push(Edge { link, weight });
    }

    pub fn contains(&self, d: &DeviceId) -> bool {
        self.adj.contains_key(d)
    }

    pub fn edges(&self, d: &DeviceId) -> &[Edge] {
        self.adj.get(d).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn vertex_count(&self) -> usize {
        self.adj.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adj.values().map(Vec::len).sum()
    }
}

/// Build the graph for one path computation from the current topology.
///
/// Every known device is a vertex. Every active link becomes an edge
/// weighted by its remaining bandwidth; inactive links are left out so they
/// can never be chosen.
pub fn snapshot<P>(platform: &P, metrics: &LinkMetrics) -> Graph
where
    P: Topology + PortStatistics + ?Sized,
{
    let mut g = Graph::new();
    for d in platform.devices() {
        g.add_vertex(d);
    }
    for l in platform.links() {
        if !l.is_active() {
            continue;
        }
        let w = metrics.weight(platform, &l);
        g.add_edge(l, w);
    }
    g
}
