//! Physical connectivity and the ratsnest derived from it.
//!
//! Copper items on the same net are clustered when their shapes touch on a
//! shared layer. Every net that ends up in more than one cluster contributes
//! ratsnest edges: the unrouted connections still required to join it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::geometry::Point;
use crate::item::{ItemId, NetCode};
use crate::spatial::SpatialIndex;

/// Shapes closer than this are considered touching (board units).
const TOUCH_EPSILON: f64 = 1e-3;

/// One required but missing connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatsnestEdge {
    pub net: NetCode,
    pub from: ItemId,
    pub to: ItemId,
    pub from_pos: Point,
    pub to_pos: Point,
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

/// Connectivity snapshot of a board.
pub struct Connectivity {
    /// Item indices per net, grouped by physical cluster.
    clusters: BTreeMap<NetCode, Vec<Vec<usize>>>,
}

impl Connectivity {
    pub fn build(board: &Board) -> Self {
        let items = board.items();
        let index = SpatialIndex::from_board(board, |i| i.is_copper() && i.net.is_some());
        let mut uf = UnionFind::new(items.len());

        for (i, item) in items.iter().enumerate() {
            let (Some(net), Some(bbox)) = (item.net, item.bbox()) else {
                continue;
            };
            if !item.is_copper() {
                continue;
            }
            for j in index.near(&bbox.inflate(TOUCH_EPSILON)) {
                if j <= i || items[j].net != Some(net) {
                    continue;
                }
                let other = &items[j];
                let touching = item.layers().into_iter().any(|layer| {
                    match (item.shape_on_layer(layer), other.shape_on_layer(layer)) {
                        (Some(a), Some(b)) => a.distance_to(&b) <= TOUCH_EPSILON,
                        _ => false,
                    }
                });
                if touching {
                    uf.union(i, j);
                }
            }
        }

        let mut by_root: BTreeMap<(NetCode, usize), Vec<usize>> = BTreeMap::new();
        for (i, item) in items.iter().enumerate() {
            if let (Some(net), true) = (item.net, item.is_copper()) {
                by_root.entry((net, uf.find(i))).or_default().push(i);
            }
        }

        let mut clusters: BTreeMap<NetCode, Vec<Vec<usize>>> = BTreeMap::new();
        for ((net, _), members) in by_root {
            clusters.entry(net).or_default().push(members);
        }

        log::debug!(
            "Connectivity built: {} nets, {} clusters",
            clusters.len(),
            clusters.values().map(Vec::len).sum::<usize>()
        );
        Self { clusters }
    }

    /// Number of physical clusters of `net`.
    pub fn cluster_count(&self, net: NetCode) -> usize {
        self.clusters.get(&net).map_or(0, Vec::len)
    }

    /// Missing connections, joining each net's clusters along a greedy spanning tree.
    ///
    /// Prim's algorithm over item anchors: each round adds the shortest link
    /// from the joined clusters to any other, keeping per item its closest
    /// joined item so a net with n items costs O(n²).
    pub fn ratsnest(&self, board: &Board) -> Vec<RatsnestEdge> {
        let items = board.items();
        let mut edges = Vec::new();

        for (&net, clusters) in &self.clusters {
            if clusters.len() < 2 {
                continue;
            }
            // Items of the net laid out cluster by cluster.
            let members: Vec<usize> = clusters.iter().flatten().copied().collect();
            let mut starts = Vec::with_capacity(clusters.len() + 1);
            let mut cluster_of = Vec::with_capacity(members.len());
            for (c, cluster) in clusters.iter().enumerate() {
                starts.push(cluster_of.len());
                cluster_of.extend(std::iter::repeat(c).take(cluster.len()));
            }
            starts.push(members.len());
            let anchors: Vec<Point> = members.iter().map(|&i| items[i].anchor()).collect();

            let mut joined = vec![false; clusters.len()];
            let mut closest: Vec<(f64, usize)> = vec![(f64::INFINITY, 0); members.len()];
            let mut newest = 0;
            joined[0] = true;

            for _ in 1..clusters.len() {
                for m in starts[newest]..starts[newest + 1] {
                    for n in 0..members.len() {
                        if joined[cluster_of[n]] {
                            continue;
                        }
                        let d = anchors[m].distance_to(&anchors[n]);
                        if d < closest[n].0 {
                            closest[n] = (d, m);
                        }
                    }
                }
                let Some(next) = (0..members.len())
                    .filter(|&n| !joined[cluster_of[n]])
                    .min_by(|&x, &y| closest[x].0.total_cmp(&closest[y].0))
                else {
                    break;
                };
                let (from, to) = (members[closest[next].1], members[next]);
                edges.push(RatsnestEdge {
                    net,
                    from: items[from].id,
                    to: items[to].id,
                    from_pos: anchors[closest[next].1],
                    to_pos: anchors[next],
                });
                newest = cluster_of[next];
                joined[newest] = true;
            }
        }
        edges
    }
}
