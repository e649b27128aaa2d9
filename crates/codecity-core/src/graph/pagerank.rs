//! PageRank over dependency edges.

use indexmap::IndexMap;

use super::DependencyGraph;

pub const DEFAULT_DAMPING: f64 = 0.85;
pub const DEFAULT_EPSILON: f64 = 1e-6;
pub const DEFAULT_MAX_ITER: usize = 100;

/// Power-iteration PageRank with uniform redistribution of dangling mass.
/// Edge weights are ignored. Stops when the L1 change drops to `epsilon`
/// or after `max_iter` rounds; an empty graph yields an empty map.
pub fn pagerank(
    graph: &DependencyGraph,
    damping: f64,
    epsilon: f64,
    max_iter: usize,
) -> IndexMap<String, f64> {
    let n = graph.node_count();
    if n == 0 {
        return IndexMap::new();
    }

    let node_count = n as f64;
    let mut scores = vec![1.0 / node_count; n];

    for _ in 0..max_iter {
        let mut next_scores = vec![(1.0 - damping) / node_count; n];

        let dangling_mass: f64 = (0..n)
            .filter(|&idx| graph.successor_indices(idx).is_empty())
            .map(|idx| scores[idx])
            .sum();
        let dangling_contrib = damping * dangling_mass / node_count;
        for score in next_scores.iter_mut() {
            *score += dangling_contrib;
        }

        for (source, score) in scores.iter().enumerate() {
            let targets = graph.successor_indices(source);
            if targets.is_empty() {
                continue;
            }
            let share = damping * score / targets.len() as f64;
            for &target in targets {
                next_scores[target] += share;
            }
        }

        let delta: f64 = next_scores
            .iter()
            .zip(&scores)
            .map(|(next, prev)| (next - prev).abs())
            .sum();
        scores = next_scores;
        if delta <= epsilon {
            break;
        }
    }

    graph
        .nodes()
        .zip(scores)
        .map(|(id, score)| (id.to_string(), score))
        .collect()
}
