// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Property-based tests for the widest path search, checked against an
//! exhaustive enumeration of simple paths on small random graphs.

#[cfg(test)]
mod proptest {
    use crate::graph::Graph;
    use crate::test::{cp, device};
    use crate::types::{Bandwidth, Link, LinkState};
    use crate::widest::widest_path;
    use proptest::prelude::*;

    const MAX_VERTICES: usize = 6;

    /// A random edge `(src, dst, weight, active)`.
    type RawEdge = (usize, usize, u64, bool);

    fn graph_strategy() -> impl Strategy<Value = (usize, Vec<RawEdge>)> {
        (2..=MAX_VERTICES).prop_flat_map(|n| {
            let edge = (0..n, 0..n, 0u64..20, prop::bool::weighted(0.8));
            (Just(n), prop::collection::vec(edge, 0..16))
        })
    }

    /// Links are made unique by numbering ports after the edge index, so
    /// parallel edges stay distinguishable.
    fn to_links(edges: &[RawEdge]) -> Vec<(Link, Bandwidth)> {
        edges
            .iter()
            .enumerate()
            .map(|(i, &(a, b, w, active))| {
                let state = if active {
                    LinkState::Active
                } else {
                    LinkState::Inactive
                };
                let l = Link::new(cp(a, i as u32), cp(b, i as u32))
                    .with_state(state);
                (l, Bandwidth::from_kbps(w))
            })
            .collect()
    }

    fn build(n: usize, links: &[(Link, Bandwidth)]) -> Graph {
        let mut g = Graph::new();
        for i in 0..n {
            g.add_vertex(device(i));
        }
        for (l, w) in links.iter().filter(|(l, _)| l.is_active()) {
            g.add_edge(l.clone(), *w);
        }
        g
    }

    /// Best bottleneck over all simple paths from `u` to `dst` using
    /// active links, or zero if there are none.
    fn brute_force(
        links: &[(Link, Bandwidth)],
        u: usize,
        dst: usize,
        limit: u64,
        visited: &mut Vec<bool>,
    ) -> u64 {
        if u == dst {
            return limit;
        }
        visited[u] = true;
        let mut best = 0;
        for (l, w) in links.iter().filter(|(l, _)| l.is_active()) {
            if l.src.device != device(u) {
                continue;
            }
            let v = (0..visited.len())
                .find(|&v| l.dst.device == device(v))
                .unwrap();
            if visited[v] {
                continue;
            }
            let b = brute_force(links, v, dst, limit.min(w.kbps()), visited);
            best = best.max(b);
        }
        visited[u] = false;
        best
    }

    proptest! {
        /// Property: the returned path is a valid chain of active links from
        /// source to destination, its reported bottleneck is the narrowest
        /// of those links, and no other simple path is wider.
        #[test]
        fn prop_widest_path_is_optimal((n, edges) in graph_strategy()) {
            let links = to_links(&edges);
            let g = build(n, &links);
            let (src, dst) = (0, n - 1);

            let expected = brute_force(
                &links, src, dst, u64::MAX, &mut vec![false; n],
            );
            let result = widest_path(&g, &device(src), &device(dst));

            match result {
                None => prop_assert_eq!(expected, 0),
                Some(path) => {
                    prop_assert!(!path.links.is_empty());
                    prop_assert_eq!(&path.links[0].src.device, &device(src));
                    prop_assert_eq!(
                        &path.links[path.links.len() - 1].dst.device,
                        &device(dst)
                    );
                    for pair in path.links.windows(2) {
                        prop_assert_eq!(&pair[0].dst.device, &pair[1].src.device);
                    }
                    let narrowest = path
                        .links
                        .iter()
                        .map(|l| {
                            prop_assert!(l.is_active(), "inactive link {l} used");
                            let (_, w) = links
                                .iter()
                                .find(|(x, _)| x == l)
                                .expect("path link is in the graph");
                            Ok(w.kbps())
                        })
                        .collect::<Result<Vec<u64>, TestCaseError>>()?
                        .into_iter()
                        .min()
                        .unwrap();
                    prop_assert_eq!(path.bottleneck.kbps(), narrowest);
                    prop_assert_eq!(path.bottleneck.kbps(), expected);
                    prop_assert!(expected > 0);
                }
            }
        }

        /// Property: the search is deterministic for a given graph.
        #[test]
        fn prop_widest_path_is_deterministic((n, edges) in graph_strategy()) {
            let g = build(n, &to_links(&edges));
            let a = widest_path(&g, &device(0), &device(n - 1));
            let b = widest_path(&g.clone(), &device(0), &device(n - 1));
            prop_assert_eq!(a, b);
        }
    }
}
