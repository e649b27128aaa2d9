//! Structural analyses over the dependency graph.
//!
//! Each analysis is independent and returns an empty result on an empty or
//! degenerate graph instead of failing.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

use super::pagerank::{pagerank, DEFAULT_DAMPING, DEFAULT_EPSILON, DEFAULT_MAX_ITER};
use super::DependencyGraph;

/// Per-node centrality scores keyed by file id.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CentralityMetrics {
    pub betweenness: IndexMap<String, f64>,
    pub pagerank: IndexMap<String, f64>,
    pub in_degree: IndexMap<String, usize>,
    pub out_degree: IndexMap<String, usize>,
}

pub fn centrality_metrics(graph: &DependencyGraph) -> CentralityMetrics {
    if graph.is_empty() {
        return CentralityMetrics::default();
    }
    CentralityMetrics {
        betweenness: betweenness_centrality(graph),
        pagerank: pagerank(graph, DEFAULT_DAMPING, DEFAULT_EPSILON, DEFAULT_MAX_ITER),
        in_degree: graph.in_degrees(),
        out_degree: graph.out_degrees(),
    }
}

/// Normalised shortest-path betweenness (Brandes), unweighted and directed.
pub fn betweenness_centrality(graph: &DependencyGraph) -> IndexMap<String, f64> {
    let n = graph.node_count();
    if n == 0 {
        return IndexMap::new();
    }

    let mut centrality = vec![0.0f64; n];
    for source in 0..n {
        let mut order = Vec::with_capacity(n);
        let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut sigma = vec![0.0f64; n];
        let mut dist: Vec<Option<usize>> = vec![None; n];
        sigma[source] = 1.0;
        dist[source] = Some(0);

        let mut queue = VecDeque::from([source]);
        while let Some(v) = queue.pop_front() {
            order.push(v);
            let Some(dv) = dist[v] else { continue };
            for &w in graph.successor_indices(v) {
                if dist[w].is_none() {
                    dist[w] = Some(dv + 1);
                    queue.push_back(w);
                }
                if dist[w] == Some(dv + 1) {
                    sigma[w] += sigma[v];
                    preds[w].push(v);
                }
            }
        }

        let mut delta = vec![0.0f64; n];
        while let Some(w) = order.pop() {
            for &v in &preds[w] {
                delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
            }
            if w != source {
                centrality[w] += delta[w];
            }
        }
    }

    if n > 2 {
        let scale = 1.0 / ((n - 1) * (n - 2)) as f64;
        for value in centrality.iter_mut() {
            *value *= scale;
        }
    }

    graph
        .nodes()
        .zip(centrality)
        .map(|(id, c)| (id.to_string(), c))
        .collect()
}

/// In-degree at the given percentile: the sorted value at
/// `floor(len * percentile / 100)`.
pub fn percentile_threshold(values: &[usize], percentile: f64) -> Option<usize> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let idx = ((sorted.len() as f64 * percentile) / 100.0) as usize;
    sorted.get(idx.min(sorted.len() - 1)).copied()
}

/// Files whose in-degree is at or above the percentile threshold and
/// strictly positive, in node order.
pub fn find_god_objects(graph: &DependencyGraph, percentile: f64) -> Vec<String> {
    let in_degrees = graph.in_degrees();
    let values: Vec<usize> = in_degrees.values().copied().collect();
    let Some(threshold) = percentile_threshold(&values, percentile) else {
        return Vec::new();
    };
    in_degrees
        .into_iter()
        .filter(|(_, degree)| *degree >= threshold && *degree > 0)
        .map(|(id, _)| id)
        .collect()
}

/// Strongly connected components of the subgraph induced by `allowed`.
fn strongly_connected_components(
    graph: &DependencyGraph,
    allowed: &HashSet<usize>,
) -> Vec<Vec<usize>> {
    let mut members: Vec<usize> = allowed.iter().copied().collect();
    members.sort_unstable();

    let mut sub: DiGraph<usize, ()> = DiGraph::with_capacity(members.len(), 0);
    let local: HashMap<usize, NodeIndex> = members
        .iter()
        .map(|&idx| (idx, sub.add_node(idx)))
        .collect();
    for (idx, from) in members.iter().map(|idx| (idx, local[idx])) {
        for w in graph.successor_indices(*idx) {
            if let Some(&to) = local.get(w) {
                sub.add_edge(from, to, ());
            }
        }
    }

    tarjan_scc(&sub)
        .into_iter()
        .map(|component| component.into_iter().map(|n| sub[n]).collect())
        .collect()
}

fn unblock(node: usize, blocked: &mut HashSet<usize>, b_sets: &mut HashMap<usize, HashSet<usize>>) {
    let mut pending = vec![node];
    while let Some(current) = pending.pop() {
        if blocked.remove(&current) {
            if let Some(waiting) = b_sets.get_mut(&current) {
                pending.extend(waiting.drain());
            }
        }
    }
}

/// Enumerate elementary cycles (Johnson), stopping after `limit` cycles.
/// Each cycle lists its nodes once, in edge order.
pub fn find_cycles(graph: &DependencyGraph, limit: usize) -> Vec<Vec<String>> {
    let mut cycles: Vec<Vec<usize>> = Vec::new();
    if limit == 0 || graph.edge_count() == 0 {
        return Vec::new();
    }

    let everything: HashSet<usize> = (0..graph.node_count()).collect();
    let mut sccs: Vec<Vec<usize>> = strongly_connected_components(graph, &everything)
        .into_iter()
        .filter(|c| c.len() > 1)
        .collect();

    'outer: while let Some(mut scc) = sccs.pop() {
        scc.sort_unstable();
        let members: HashSet<usize> = scc.iter().copied().collect();
        let neighbours = |v: usize| -> Vec<usize> {
            graph
                .successor_indices(v)
                .iter()
                .copied()
                .filter(|w| members.contains(w))
                .collect()
        };

        let Some(start) = scc.pop() else { continue };
        let mut path = vec![start];
        let mut blocked: HashSet<usize> = HashSet::from([start]);
        let mut closed: HashSet<usize> = HashSet::new();
        let mut b_sets: HashMap<usize, HashSet<usize>> = HashMap::new();
        let mut frames: Vec<(usize, Vec<usize>)> = vec![(start, neighbours(start))];

        while let Some((this, nbrs)) = frames.last_mut() {
            let this = *this;
            if let Some(next) = nbrs.pop() {
                if next == start {
                    cycles.push(path.clone());
                    if cycles.len() >= limit {
                        break 'outer;
                    }
                    closed.extend(path.iter().copied());
                } else if !blocked.contains(&next) {
                    path.push(next);
                    frames.push((next, neighbours(next)));
                    closed.remove(&next);
                    blocked.insert(next);
                    continue;
                }
            }
            let exhausted = frames.last().is_some_and(|(_, n)| n.is_empty());
            if exhausted {
                if closed.contains(&this) {
                    unblock(this, &mut blocked, &mut b_sets);
                } else {
                    for w in neighbours(this) {
                        b_sets.entry(w).or_default().insert(this);
                    }
                }
                frames.pop();
                path.pop();
            }
        }

        let remaining: HashSet<usize> = scc.into_iter().collect();
        sccs.extend(
            strongly_connected_components(graph, &remaining)
                .into_iter()
                .filter(|c| c.len() > 1),
        );
    }

    cycles
        .into_iter()
        .map(|cycle| {
            cycle
                .into_iter()
                .filter_map(|idx| graph.node_id(idx).map(str::to_string))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::graph_from;

    fn normalise(mut cycles: Vec<Vec<String>>) -> Vec<Vec<String>> {
        for cycle in cycles.iter_mut() {
            if let Some(min_pos) = cycle
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.cmp(b.1))
                .map(|(i, _)| i)
            {
                cycle.rotate_left(min_pos);
            }
        }
        cycles.sort();
        cycles
    }

    #[test]
    fn test_empty_graph_analyses_are_empty() {
        let g = DependencyGraph::new();
        assert!(betweenness_centrality(&g).is_empty());
        assert!(find_god_objects(&g, 95.0).is_empty());
        assert!(find_cycles(&g, 10).is_empty());
        let metrics = centrality_metrics(&g);
        assert!(metrics.pagerank.is_empty() && metrics.in_degree.is_empty());
    }

    #[test]
    fn test_betweenness_of_bridge() {
        let g = graph_from(&[("a", "b"), ("b", "c")]);
        let bc = betweenness_centrality(&g);
        // One of (n-1)(n-2) = 2 ordered pairs routes through b.
        assert!((bc["b"] - 0.5).abs() < 1e-12);
        assert_eq!(bc["a"], 0.0);
        assert_eq!(bc["c"], 0.0);
    }

    #[test]
    fn test_betweenness_splits_parallel_paths() {
        let g = graph_from(&[("s", "x"), ("s", "y"), ("x", "t"), ("y", "t")]);
        let bc = betweenness_centrality(&g);
        // s->t has two shortest paths, each intermediary carries half.
        let scale = 1.0 / 6.0;
        assert!((bc["x"] - 0.5 * scale).abs() < 1e-12);
        assert!((bc["y"] - 0.5 * scale).abs() < 1e-12);
    }

    #[test]
    fn test_percentile_threshold() {
        assert_eq!(percentile_threshold(&[], 95.0), None);
        // int(3 * 0.95) = 2
        assert_eq!(percentile_threshold(&[1, 0, 1], 95.0), Some(1));
        // int(20 * 0.95) = 19
        let values: Vec<usize> = (0..20).collect();
        assert_eq!(percentile_threshold(&values, 95.0), Some(19));
    }

    #[test]
    fn test_god_objects_need_positive_in_degree() {
        let isolated = {
            let mut g = DependencyGraph::new();
            g.add_node("a");
            g.add_node("b");
            g
        };
        assert!(find_god_objects(&isolated, 95.0).is_empty());

        let mut edges = Vec::new();
        let leaves: Vec<String> = (0..19).map(|i| format!("leaf{i}")).collect();
        for leaf in &leaves {
            edges.push((leaf.as_str(), "hub"));
        }
        let g = graph_from(&edges);
        assert_eq!(find_god_objects(&g, 95.0), vec!["hub".to_string()]);
    }

    #[test]
    fn test_cycles_two_node() {
        let g = graph_from(&[("x", "y"), ("y", "x")]);
        let cycles = normalise(find_cycles(&g, 10));
        assert_eq!(cycles, vec![vec!["x".to_string(), "y".to_string()]]);
    }

    #[test]
    fn test_cycles_enumerates_all_elementary_cycles() {
        let g = graph_from(&[
            ("a", "b"),
            ("b", "a"),
            ("b", "c"),
            ("c", "a"),
            ("d", "e"),
        ]);
        let cycles = normalise(find_cycles(&g, 10));
        assert_eq!(
            cycles,
            vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["a".to_string(), "b".to_string(), "c".to_string()],
            ]
        );
    }

    #[test]
    fn test_cycles_respect_limit() {
        // Complete digraph on 5 nodes has far more than 3 cycles.
        let ids = ["a", "b", "c", "d", "e"];
        let mut edges = Vec::new();
        for s in ids {
            for t in ids {
                if s != t {
                    edges.push((s, t));
                }
            }
        }
        let g = graph_from(&edges);
        assert_eq!(find_cycles(&g, 3).len(), 3);
        assert_eq!(find_cycles(&graph_from(&[("a", "b")]), 10).len(), 0);
    }

    #[test]
    fn test_components_of_allowed_subgraph() {
        let g = graph_from(&[("a", "b"), ("b", "a"), ("b", "c"), ("c", "d"), ("d", "c")]);
        let idx = |id: &str| g.node_index(id).unwrap();
        let sorted = |mut comps: Vec<Vec<usize>>| {
            for c in comps.iter_mut() {
                c.sort_unstable();
            }
            comps.sort();
            comps
        };

        let all: HashSet<usize> = (0..g.node_count()).collect();
        assert_eq!(
            sorted(strongly_connected_components(&g, &all)),
            vec![vec![idx("a"), idx("b")], vec![idx("c"), idx("d")]]
        );

        let without_d: HashSet<usize> = all.iter().copied().filter(|&i| i != idx("d")).collect();
        assert_eq!(
            sorted(strongly_connected_components(&g, &without_d)),
            vec![vec![idx("a"), idx("b")], vec![idx("c")]]
        );
    }
}
