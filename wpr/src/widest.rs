// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::graph::{Edge, Graph};
use crate::types::{Bandwidth, DeviceId, Link};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct WidestPath {
    /// Links from source to destination, in order.
    pub links: Vec<Link>,

    /// Weight of the narrowest link. Unbounded for an empty path.
    pub bottleneck: Bandwidth,
}

impl WidestPath {
    pub fn hops(&self) -> usize {
        self.links.len()
    }
}

/// A frontier entry. Higher bottlenecks come out of the heap first; among
/// equal bottlenecks the entry pushed first wins.
#[derive(Debug)]
struct Frontier<'a> {
    bottleneck: Bandwidth,
    seq: u64,
    vertex: &'a DeviceId,
}

impl PartialEq for Frontier<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.bottleneck == other.bottleneck && self.seq == other.seq
    }
}

impl Eq for Frontier<'_> {}

impl PartialOrd for Frontier<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier<'_> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.bottleneck
            .cmp(&other.bottleneck)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Find the path from `src` to `dst` whose narrowest link is as wide as
/// possible.
///
/// This is Dijkstra's algorithm with the relaxation inverted: a vertex's
/// value is the best bottleneck reachable from `src` so far, the frontier
/// is a max-heap, and an edge `u -> v` offers `min(best[u], weight)` to
/// `v`. A vertex is only updated on a strict improvement, so when two paths
/// tie the one discovered first is kept. Unreached vertices sit at zero,
/// which means zero-weight edges never carry a path.
///
/// Returns `None` when `dst` cannot be reached over positive-weight edges
/// or either endpoint is not in the graph.
pub fn widest_path(
    g: &Graph,
    src: &DeviceId,
    dst: &DeviceId,
) -> Option<WidestPath> {
    if !g.contains(src) || !g.contains(dst) {
        return None;
    }
    if src == dst {
        return Some(WidestPath {
            links: Vec::new(),
            bottleneck: Bandwidth::UNBOUNDED,
        });
    }

    let mut best = BTreeMap::<&DeviceId, Bandwidth>::new();
    let mut prev = BTreeMap::<&DeviceId, &Edge>::new();
    let mut done = BTreeSet::<&DeviceId>::new();
    let mut q = BinaryHeap::<Frontier>::new();
    let mut seq = 0u64;

    best.insert(src, Bandwidth::UNBOUNDED);
    q.push(Frontier {
        bottleneck: Bandwidth::UNBOUNDED,
        seq,
        vertex: src,
    });

    while let Some(u) = q.pop() {
        // a vertex is pushed again each time it improves, and the best
        // entry always comes out first
        if !done.insert(u.vertex) {
            continue;
        }
        if u.vertex == dst {
            break;
        }
        for e in g.edges(u.vertex) {
            let v = &e.link.dst.device;
            if done.contains(v) {
                continue;
            }
            let candidate = u.bottleneck.min(e.weight);
            let current = best.get(v).copied().unwrap_or(Bandwidth::ZERO);
            if candidate > current {
                best.insert(v, candidate);
                prev.insert(v, e);
                seq += 1;
                q.push(Frontier {
                    bottleneck: candidate,
                    seq,
                    vertex: v,
                });
            }
        }
    }

    let bottleneck = best.get(dst).copied()?;

    let mut links = Vec::new();
    let mut x = dst;
    while x != src {
        let e = prev.get(x)?;
        links.push(e.link.clone());
        x = &e.link.src.device;
    }
    links.reverse();

    Some(WidestPath { links, bottleneck })
}
