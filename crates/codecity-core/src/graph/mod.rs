//! Weighted directed dependency graph over file ids.

pub mod analysis;
pub mod pagerank;

use std::collections::HashSet;

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::config::ResolverConfig;
use crate::indexer::imports::ImportResolver;
use crate::models::FileRecord;

/// Directed graph with accumulated edge weights. Nodes and edges keep
/// insertion order, so every traversal is reproducible.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: IndexSet<String>,
    edges: IndexMap<(usize, usize), u32>,
    successors: Vec<Vec<usize>>,
    predecessors: Vec<Vec<usize>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `id` if absent and return its index.
    pub fn add_node(&mut self, id: &str) -> usize {
        if let Some(idx) = self.nodes.get_index_of(id) {
            return idx;
        }
        let (idx, _) = self.nodes.insert_full(id.to_string());
        self.successors.push(Vec::new());
        self.predecessors.push(Vec::new());
        idx
    }

    /// Add one occurrence of `source -> target`. Both endpoints must already
    /// be nodes; self-loops and unknown endpoints are rejected.
    pub fn add_edge(&mut self, source: &str, target: &str) -> bool {
        let (Some(s), Some(t)) = (self.node_index(source), self.node_index(target)) else {
            return false;
        };
        if s == t {
            return false;
        }
        let weight = self.edges.entry((s, t)).or_insert(0);
        if *weight == 0 {
            self.successors[s].push(t);
            self.predecessors[t].push(s);
        }
        *weight += 1;
        true
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains(id)
    }

    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.nodes.get_index_of(id)
    }

    pub fn node_id(&self, idx: usize) -> Option<&str> {
        self.nodes.get_index(idx).map(String::as_str)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(String::as_str)
    }

    pub fn weight(&self, source: &str, target: &str) -> Option<u32> {
        let s = self.node_index(source)?;
        let t = self.node_index(target)?;
        self.edges.get(&(s, t)).copied()
    }

    /// `(source, target, weight)` in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, u32)> {
        self.edges.iter().map(|(&(s, t), &w)| {
            (
                self.nodes[s].as_str(),
                self.nodes[t].as_str(),
                w,
            )
        })
    }

    pub(crate) fn edge_indices(&self) -> impl Iterator<Item = ((usize, usize), u32)> + '_ {
        self.edges.iter().map(|(&k, &w)| (k, w))
    }

    pub(crate) fn successor_indices(&self, idx: usize) -> &[usize] {
        &self.successors[idx]
    }

    pub fn in_degree(&self, id: &str) -> usize {
        self.node_index(id)
            .map(|idx| self.predecessors[idx].len())
            .unwrap_or(0)
    }

    pub fn out_degree(&self, id: &str) -> usize {
        self.node_index(id)
            .map(|idx| self.successors[idx].len())
            .unwrap_or(0)
    }

    pub fn in_degrees(&self) -> IndexMap<String, usize> {
        self.nodes
            .iter()
            .zip(&self.predecessors)
            .map(|(id, preds)| (id.clone(), preds.len()))
            .collect()
    }

    pub fn out_degrees(&self) -> IndexMap<String, usize> {
        self.nodes
            .iter()
            .zip(&self.successors)
            .map(|(id, succs)| (id.clone(), succs.len()))
            .collect()
    }

    /// Subgraph induced by every node within `hops` steps of `center`,
    /// following edges in both directions. Empty if `center` is unknown.
    pub fn neighborhood(&self, center: &str, hops: usize) -> DependencyGraph {
        let Some(start) = self.node_index(center) else {
            return DependencyGraph::new();
        };

        let mut selected: IndexSet<usize> = IndexSet::from([start]);
        let mut frontier = vec![start];
        for _ in 0..hops {
            let mut next = Vec::new();
            for &idx in &frontier {
                for &other in self.successors[idx].iter().chain(&self.predecessors[idx]) {
                    if selected.insert(other) {
                        next.push(other);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        let mut sub = DependencyGraph::new();
        let mut ordered: Vec<usize> = selected.into_iter().collect();
        ordered.sort_unstable();
        let members: HashSet<usize> = ordered.iter().copied().collect();
        for &idx in &ordered {
            sub.add_node(&self.nodes[idx]);
        }
        for (&(s, t), &w) in &self.edges {
            if members.contains(&s) && members.contains(&t) {
                let si = sub.add_node(&self.nodes[s]);
                let ti = sub.add_node(&self.nodes[t]);
                sub.edges.insert((si, ti), w);
                sub.successors[si].push(ti);
                sub.predecessors[ti].push(si);
            }
        }
        sub
    }
}

/// Build the dependency graph: one node per record, one weighted edge per
/// resolved import pair.
pub fn build_dependency_graph(records: &[FileRecord], config: &ResolverConfig) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for record in records {
        graph.add_node(&record.id);
    }

    let resolver = ImportResolver::new(records.iter().map(|r| r.id.as_str()), config);
    let mut unresolved = 0usize;
    for record in records {
        for import in &record.imports {
            match resolver.resolve(import, &record.id) {
                Some(target) => {
                    graph.add_edge(&record.id, target);
                }
                None => unresolved += 1,
            }
        }
    }

    debug!(
        "Dependency graph: {} nodes, {} edges, {} unresolved imports",
        graph.node_count(),
        graph.edge_count(),
        unresolved
    );
    graph
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{FileStructure, Language};

    pub(crate) fn record(id: &str, imports: &[&str]) -> FileRecord {
        FileRecord {
            id: id.to_string(),
            name: id.rsplit('/').next().unwrap_or(id).to_string(),
            language: Language::Python,
            content: String::new(),
            loc: 1,
            complexity: 1,
            age_days: 0,
            churn: 0,
            imports: imports.iter().map(|s| s.to_string()).collect(),
            structure: FileStructure::default(),
            is_hotspot: false,
            decay_level: 0.0,
        }
    }

    pub(crate) fn graph_from(edges: &[(&str, &str)]) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for (s, t) in edges {
            graph.add_node(s);
            graph.add_node(t);
            graph.add_edge(s, t);
        }
        graph
    }

    #[test]
    fn test_add_edge_accumulates_weight() {
        let mut g = graph_from(&[("a", "b")]);
        assert!(g.add_edge("a", "b"));
        assert_eq!(g.weight("a", "b"), Some(2));
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.out_degree("a"), 1);
    }

    #[test]
    fn test_rejects_self_loops_and_dangling() {
        let mut g = graph_from(&[("a", "b")]);
        assert!(!g.add_edge("a", "a"));
        assert!(!g.add_edge("a", "ghost"));
        assert!(!g.contains("ghost"));
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn test_build_resolves_and_drops() {
        let records = vec![
            record("a.py", &["b", "numpy", "a"]),
            record("b.py", &["c"]),
            record("c.py", &[]),
        ];
        let g = build_dependency_graph(&records, &ResolverConfig::default());
        assert_eq!(g.node_count(), 3);
        let edges: Vec<(&str, &str, u32)> = g.edges().collect();
        assert_eq!(edges, vec![("a.py", "b.py", 1), ("b.py", "c.py", 1)]);
    }

    #[test]
    fn test_weight_counts_each_resolved_import() {
        let records = vec![record("app.py", &["util", "util.py"]), record("util.py", &[])];
        let g = build_dependency_graph(&records, &ResolverConfig::default());
        assert_eq!(g.weight("app.py", "util.py"), Some(2));
        let again = build_dependency_graph(&records, &ResolverConfig::default());
        assert_eq!(again.weight("app.py", "util.py"), Some(2));
    }

    #[test]
    fn test_import_matrix_degree_sums() {
        let ids = ["m0.py", "m1.py", "m2.py", "m3.py"];
        let matrix = [
            [0, 1, 1, 0],
            [0, 0, 1, 1],
            [1, 0, 0, 0],
            [0, 0, 1, 0],
        ];
        let records: Vec<FileRecord> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let imports: Vec<&str> = (0..ids.len())
                    .filter(|&j| matrix[i][j] == 1)
                    .map(|j| ids[j].trim_end_matches(".py"))
                    .collect();
                record(id, &imports)
            })
            .collect();
        let g = build_dependency_graph(&records, &ResolverConfig::default());

        for (i, id) in ids.iter().enumerate() {
            let row: usize = matrix[i].iter().sum();
            let col: usize = matrix.iter().map(|r| r[i]).sum();
            assert_eq!(g.out_degree(id), row, "out-degree of {id}");
            assert_eq!(g.in_degree(id), col, "in-degree of {id}");
        }
        assert_eq!(g.edge_count(), 6);
    }

    #[test]
    fn test_neighborhood_counts_hops_both_ways() {
        let g = graph_from(&[("a", "b"), ("b", "c"), ("c", "d"), ("e", "b")]);
        let one = g.neighborhood("c", 1);
        let mut nodes: Vec<&str> = one.nodes().collect();
        nodes.sort();
        assert_eq!(nodes, vec!["b", "c", "d"]);
        assert_eq!(one.edge_count(), 2);

        let two = g.neighborhood("c", 2);
        assert_eq!(two.node_count(), 5);
        assert_eq!(two.edge_count(), 4);
        assert_eq!(two.in_degree("b"), 2);

        assert!(g.neighborhood("zzz", 3).is_empty());
        assert_eq!(g.neighborhood("a", 0).node_count(), 1);
    }

    #[test]
    fn test_degree_maps_cover_isolated_nodes() {
        let mut g = graph_from(&[("a", "b")]);
        g.add_node("lonely");
        let ins = g.in_degrees();
        assert_eq!(ins.get("lonely"), Some(&0));
        assert_eq!(ins.get("b"), Some(&1));
        assert_eq!(g.out_degrees().get("a"), Some(&1));
    }
}
