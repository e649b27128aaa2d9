//! Modularity-based community detection (Louvain).
//!
//! Operates on the undirected projection of the dependency graph: the weight
//! between two files is the sum of the weights in both directions. Each level
//! runs local moving to convergence, then collapses every community into a
//! single node and repeats on the coarser graph until no node moves.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;

use crate::graph::DependencyGraph;

const MAX_LEVELS: usize = 32;
const MAX_PASSES: usize = 100;
const MIN_TOTAL_WEIGHT: f64 = 1e-9;

/// Outcome of a modularity run.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// node index -> community, numbered by first appearance in node order
    pub assignments: Vec<usize>,
    pub community_count: usize,
    pub modularity: f64,
}

/// One level of the coarsening hierarchy.
#[derive(Debug, Clone)]
struct Level {
    /// Neighbours other than the node itself.
    adj: Vec<Vec<(usize, f64)>>,
    /// Weight folded into the node by aggregation, counted from both ends.
    self_loops: Vec<f64>,
    /// Weighted degree including `self_loops`.
    k_i: Vec<f64>,
}

impl Level {
    fn len(&self) -> usize {
        self.adj.len()
    }

    /// Move single nodes between communities until no move improves
    /// modularity. Returns the community of each node and whether any moved.
    fn local_moving(&self, two_m: f64) -> (Vec<usize>, bool) {
        let n = self.len();
        let m = two_m / 2.0;
        let mut community: Vec<usize> = (0..n).collect();
        let mut sigma_tot = self.k_i.clone();
        let mut improved = false;

        for _ in 0..MAX_PASSES {
            let mut moved = false;
            for node in 0..n {
                let current = community[node];
                let k_i = self.k_i[node];
                let weight_to = |comm: usize| -> f64 {
                    self.adj[node]
                        .iter()
                        .filter(|(nb, _)| community[*nb] == comm)
                        .map(|(_, w)| w)
                        .sum()
                };
                let k_in_current = weight_to(current);
                sigma_tot[current] -= k_i;

                let candidates: BTreeSet<usize> =
                    self.adj[node].iter().map(|&(nb, _)| community[nb]).collect();

                let mut best = current;
                let mut best_delta = 0.0f64;
                for &target in &candidates {
                    if target == current {
                        continue;
                    }
                    let delta = (weight_to(target) - k_in_current) / m
                        - k_i * (sigma_tot[target] - sigma_tot[current]) / (2.0 * m * m);
                    if delta > best_delta {
                        best_delta = delta;
                        best = target;
                    }
                }

                community[node] = best;
                sigma_tot[best] += k_i;
                if best != current {
                    moved = true;
                    improved = true;
                }
            }
            if !moved {
                break;
            }
        }
        (community, improved)
    }

    /// Collapse each of the `count` communities into one node.
    fn aggregate(&self, community: &[usize], count: usize) -> Level {
        let mut links: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); count];
        let mut self_loops = vec![0.0f64; count];
        let mut k_i = vec![0.0f64; count];

        for node in 0..self.len() {
            let c = community[node];
            self_loops[c] += self.self_loops[node];
            k_i[c] += self.k_i[node];
            for &(nb, w) in &self.adj[node] {
                let d = community[nb];
                if c == d {
                    self_loops[c] += w;
                } else {
                    *links[c].entry(d).or_insert(0.0) += w;
                }
            }
        }

        Level {
            adj: links.into_iter().map(|l| l.into_iter().collect()).collect(),
            self_loops,
            k_i,
        }
    }

    fn modularity(&self, community: &[usize], two_m: f64) -> f64 {
        let count = community.iter().copied().max().map_or(0, |c| c + 1);
        let mut internal = vec![0.0f64; count];
        let mut total = vec![0.0f64; count];
        for node in 0..self.len() {
            let c = community[node];
            total[c] += self.k_i[node];
            internal[c] += self.self_loops[node];
            for &(nb, w) in &self.adj[node] {
                if community[nb] == c {
                    internal[c] += w;
                }
            }
        }
        internal
            .iter()
            .zip(&total)
            .map(|(inside, tot)| inside / two_m - (tot / two_m).powi(2))
            .sum()
    }
}

/// Renumber communities by first appearance. Returns the community count.
fn renumber(community: &mut [usize]) -> usize {
    let mut order: IndexMap<usize, usize> = IndexMap::new();
    for c in community.iter_mut() {
        let next = order.len();
        *c = *order.entry(*c).or_insert(next);
    }
    order.len()
}

pub struct Louvain {
    base: Level,
    /// 2m, unchanged by aggregation
    total_weight: f64,
}

impl Louvain {
    /// Undirected projection of `graph`. Returns `None` when modularity is
    /// undefined because the graph has no edge weight.
    pub fn from_graph(graph: &DependencyGraph) -> Option<Self> {
        let n = graph.node_count();
        let mut undirected: IndexMap<(usize, usize), f64> = IndexMap::new();
        for ((s, t), w) in graph.edge_indices() {
            let key = (s.min(t), s.max(t));
            *undirected.entry(key).or_insert(0.0) += f64::from(w);
        }

        let mut adj: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        let mut k_i = vec![0.0f64; n];
        let mut weight_sum = 0.0f64;
        for (&(a, b), &w) in &undirected {
            adj[a].push((b, w));
            adj[b].push((a, w));
            k_i[a] += w;
            k_i[b] += w;
            weight_sum += w;
        }
        if n == 0 || weight_sum < MIN_TOTAL_WEIGHT {
            return None;
        }

        Some(Self {
            base: Level {
                adj,
                self_loops: vec![0.0; n],
                k_i,
            },
            total_weight: 2.0 * weight_sum,
        })
    }

    pub fn run(self) -> Partition {
        self.run_levels(MAX_LEVELS)
    }

    fn run_levels(self, max_levels: usize) -> Partition {
        let two_m = self.total_weight;
        // original node -> node of the current level
        let mut membership: Vec<usize> = (0..self.base.len()).collect();
        let mut level = self.base.clone();

        for _ in 0..max_levels {
            let (mut community, moved) = level.local_moving(two_m);
            if !moved {
                break;
            }
            let count = renumber(&mut community);
            for m in membership.iter_mut() {
                *m = community[*m];
            }
            if count == level.len() {
                break;
            }
            level = level.aggregate(&community, count);
        }

        let community_count = renumber(&mut membership);
        Partition {
            modularity: self.base.modularity(&membership, two_m),
            assignments: membership,
            community_count,
        }
    }
}

/// Detect communities, or `None` if the graph carries no edge weight.
pub fn detect_communities(graph: &DependencyGraph) -> Option<Partition> {
    Louvain::from_graph(graph).map(Louvain::run)
}
