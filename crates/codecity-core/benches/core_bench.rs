//! Criterion benchmarks for codecity-core.
//!
//! ## Benchmark groups
//!
//! 1. **complexity**: decision-point scoring on generated sources.
//! 2. **imports**: regex and tree-sitter import extraction.
//! 3. **graph_build**: import resolution over synthetic trees.
//! 4. **pagerank**: convergence on synthetic graphs.
//! 5. **louvain**: community detection on clustered graphs.
//! 6. **layout**: clustering plus full city layout.
//!
//! ## Running
//!
//! ```sh
//! cargo bench --manifest-path crates/codecity-core/Cargo.toml
//! # Only the layout group:
//! cargo bench --manifest-path crates/codecity-core/Cargo.toml -- layout
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use codecity_core::city::community::detect_communities;
use codecity_core::city::{cluster_files, LayoutEngine};
use codecity_core::config::{ClusteringStrategy, LayoutConfig, ResolverConfig};
use codecity_core::graph::pagerank::{pagerank, DEFAULT_DAMPING, DEFAULT_EPSILON, DEFAULT_MAX_ITER};
use codecity_core::graph::{build_dependency_graph, DependencyGraph};
use codecity_core::indexer::metrics::cyclomatic_complexity;
use codecity_core::indexer::parser::TreeSitterExtractor;
use codecity_core::indexer::symbols::{RegexExtractor, StructureExtractor};
use codecity_core::models::{FileRecord, FileStructure, Language};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A python module with `functions` branchy functions and a few imports.
fn python_source(functions: usize) -> String {
    let mut src = String::from("import os\nimport sys\nfrom .models import User\n\n");
    for i in 0..functions {
        src.push_str(&format!(
            "def handler_{i}(x):\n    if x > {i} and x < 100:\n        return x\n    \
             for y in range(x):\n        while y:\n            y -= 1\n    return 0\n\n"
        ));
    }
    src
}

fn record(id: &str, imports: Vec<String>) -> FileRecord {
    FileRecord {
        id: id.to_string(),
        name: id.rsplit('/').next().unwrap_or(id).to_string(),
        language: Language::Python,
        content: String::new(),
        loc: 120,
        complexity: 6,
        age_days: 30,
        churn: 2,
        imports,
        structure: FileStructure::default(),
        is_hotspot: false,
        decay_level: 0.0,
    }
}

/// `groups` packages of `per_group` files. Each file imports its two
/// successors in the same package and, every fifth file, one file of the
/// next package.
fn synthetic_tree(groups: usize, per_group: usize) -> Vec<FileRecord> {
    let mut records = Vec::with_capacity(groups * per_group);
    for g in 0..groups {
        for i in 0..per_group {
            let mut imports = vec![
                format!("pkg{g}.mod{}", (i + 1) % per_group),
                format!("pkg{g}.mod{}", (i + 2) % per_group),
            ];
            if i % 5 == 0 {
                imports.push(format!("pkg{}.mod{i}", (g + 1) % groups));
            }
            records.push(record(&format!("pkg{g}/mod{i}.py"), imports));
        }
    }
    records
}

fn chain_graph(n: usize) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for i in 0..n {
        graph.add_node(&format!("n{i}"));
    }
    for i in 0..n {
        graph.add_edge(&format!("n{i}"), &format!("n{}", (i + 1) % n));
        graph.add_edge(&format!("n{i}"), &format!("n{}", (i * 7 + 3) % n));
    }
    graph
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_complexity(c: &mut Criterion) {
    let mut group = c.benchmark_group("complexity");
    for &functions in &[10, 100, 1000] {
        let src = python_source(functions);
        group.bench_with_input(BenchmarkId::new("python", functions), &src, |b, src| {
            b.iter(|| cyclomatic_complexity(black_box(src), Language::Python));
        });
    }
    group.finish();
}

fn bench_imports(c: &mut Criterion) {
    let mut group = c.benchmark_group("imports");
    let src = python_source(200);
    let regex = RegexExtractor;
    let tree_sitter = TreeSitterExtractor::new();
    group.bench_function("regex_python", |b| {
        b.iter(|| regex.imports(black_box(&src), Language::Python));
    });
    group.bench_function("tree_sitter_python", |b| {
        b.iter(|| tree_sitter.imports(black_box(&src), Language::Python));
    });
    group.finish();
}

fn bench_graph_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_build");
    for &(groups, per_group) in &[(5, 20), (10, 50), (20, 100)] {
        let records = synthetic_tree(groups, per_group);
        group.bench_with_input(
            BenchmarkId::new("files", records.len()),
            &records,
            |b, records| {
                b.iter(|| build_dependency_graph(black_box(records), &ResolverConfig::default()));
            },
        );
    }
    group.finish();
}

fn bench_pagerank(c: &mut Criterion) {
    let mut group = c.benchmark_group("pagerank");
    for &n in &[10, 100, 1000] {
        let graph = chain_graph(n);
        group.bench_with_input(BenchmarkId::new("nodes", n), &graph, |b, graph| {
            b.iter(|| pagerank(black_box(graph), DEFAULT_DAMPING, DEFAULT_EPSILON, DEFAULT_MAX_ITER));
        });
    }
    group.finish();
}

fn bench_louvain(c: &mut Criterion) {
    let mut group = c.benchmark_group("louvain");
    for &(groups, per_group) in &[(5, 20), (10, 50)] {
        let records = synthetic_tree(groups, per_group);
        let graph = build_dependency_graph(&records, &ResolverConfig::default());
        group.bench_with_input(
            BenchmarkId::new("files", records.len()),
            &graph,
            |b, graph| {
                b.iter(|| detect_communities(black_box(graph)));
            },
        );
    }
    group.finish();
}

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");
    let engine = LayoutEngine::new(LayoutConfig::default());
    for &(groups, per_group) in &[(5, 20), (10, 50)] {
        let records = synthetic_tree(groups, per_group);
        let graph = build_dependency_graph(&records, &ResolverConfig::default());
        group.bench_with_input(
            BenchmarkId::new("files", records.len()),
            &(records, graph),
            |b, (records, graph)| {
                b.iter(|| {
                    let mut clusters =
                        cluster_files(graph, records, ClusteringStrategy::Modularity);
                    black_box(engine.generate(records, &mut clusters, graph))
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_complexity,
    bench_imports,
    bench_graph_build,
    bench_pagerank,
    bench_louvain,
    bench_layout,
);
criterion_main!(benches);
