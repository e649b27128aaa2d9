//! Analysis orchestration: discovery, parsing, graph, clustering, layout and
//! assembly of the final [`CityModel`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::city::layout::CityLayout;
use crate::city::{cluster_files, Cluster, LayoutEngine};
use crate::config::{AnalyzerConfig, ExtractorBackend, GOD_OBJECT_PERCENTILE, MAX_CYCLES};
use crate::errors::{CityError, CityResult};
use crate::graph::analysis::{centrality_metrics, find_cycles, find_god_objects, CentralityMetrics};
use crate::graph::{build_dependency_graph, DependencyGraph};
use crate::indexer::filesystem::discover_files;
use crate::indexer::history::open_history;
use crate::indexer::parser::TreeSitterExtractor;
use crate::indexer::pipeline::{parse_files, ParseContext};
use crate::indexer::symbols::{RegexExtractor, StructureExtractor};
use crate::models::{
    Building, BuildingMetrics, CityModel, CityStats, Dimensions, District, FileRecord, Road,
};
use crate::store::cache::CityCache;

/// Graph-level findings for one analysed tree.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphReport {
    pub node_count: usize,
    pub edge_count: usize,
    pub cycles: Vec<Vec<String>>,
    pub god_objects: Vec<String>,
    pub centrality: CentralityMetrics,
}

/// Cycles (capped), god objects and centrality for `graph`.
pub fn graph_report(graph: &DependencyGraph) -> GraphReport {
    GraphReport {
        node_count: graph.node_count(),
        edge_count: graph.edge_count(),
        cycles: find_cycles(graph, MAX_CYCLES),
        god_objects: find_god_objects(graph, GOD_OBJECT_PERCENTILE),
        centrality: centrality_metrics(graph),
    }
}

/// Drives one analysis run per call. Holds no per-run state, so a single
/// analyzer can serve concurrent callers.
pub struct CityAnalyzer {
    config: AnalyzerConfig,
    extractor: Arc<dyn StructureExtractor>,
    cache: Option<Arc<dyn CityCache>>,
}

impl Default for CityAnalyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}

impl CityAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        let config = config.normalized();
        let extractor: Arc<dyn StructureExtractor> = match config.extractor {
            ExtractorBackend::Regex => Arc::new(RegexExtractor),
            ExtractorBackend::TreeSitter => Arc::new(TreeSitterExtractor::new()),
        };
        Self {
            config,
            extractor,
            cache: None,
        }
    }

    /// Replace the structure extractor chosen by the config.
    pub fn with_extractor(mut self, extractor: Arc<dyn StructureExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CityCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Cache key for `root`: `<canonical root>::<max_files>`.
    pub fn cache_key(&self, root: &Path) -> CityResult<String> {
        let root = validate_root(root)?;
        Ok(format!("{}::{}", root.display(), self.config.max_files))
    }

    /// Analyse `root`, consulting the injected cache first.
    pub fn analyze(&self, root: &Path) -> CityResult<Arc<CityModel>> {
        let root = validate_root(root)?;
        let key = format!("{}::{}", root.display(), self.config.max_files);

        if let Some(cache) = &self.cache {
            match cache.get(&key) {
                Ok(Some(model)) => {
                    debug!("Cache hit for {key}");
                    return Ok(model);
                }
                Ok(None) => {}
                Err(e) => warn!("Cache lookup failed for {key}, analysing uncached: {e}"),
            }
        }

        let model = Arc::new(self.run(&root));

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(&key, Arc::clone(&model)) {
                warn!("Failed to cache city for {key}: {e}");
            }
        }
        Ok(model)
    }

    /// Parse every discovered file under `root`, sorted by file id.
    pub fn parse(&self, root: &Path) -> CityResult<Vec<FileRecord>> {
        let root = validate_root(root)?;
        Ok(self.parse_tree(&root))
    }

    /// Parse `root` and report cycles, god objects and centrality.
    pub fn inspect(&self, root: &Path) -> CityResult<GraphReport> {
        let root = validate_root(root)?;
        let records = self.parse_tree(&root);
        let graph = build_dependency_graph(&records, &self.config.resolver);
        Ok(graph_report(&graph))
    }

    fn parse_tree(&self, root: &Path) -> Vec<FileRecord> {
        let paths = discover_files(root, self.config.max_files, self.config.max_file_bytes);
        info!("Discovered {} files under {}", paths.len(), root.display());

        let history = open_history(root, self.config.use_history, self.config.history_commit_limit);
        let ctx = ParseContext {
            root,
            extractor: self.extractor.as_ref(),
            history: history.as_ref(),
            content_snapshot_chars: self.config.content_snapshot_chars,
            churn_window_days: self.config.churn_window_days,
            now: chrono::Utc::now().timestamp(),
        };

        let mut records = parse_files(&ctx, &paths, &self.config);
        records.sort_by(|a, b| a.id.cmp(&b.id));
        info!(
            "Parsed {} of {} files with the {} extractor",
            records.len(),
            paths.len(),
            self.extractor.name()
        );
        records
    }

    fn run(&self, root: &Path) -> CityModel {
        let started = Instant::now();
        let name = city_name(root);

        let records = self.parse_tree(root);
        if records.is_empty() {
            info!("No parseable files under {}, returning an empty city", root.display());
            return CityModel::empty(name);
        }

        let graph = build_dependency_graph(&records, &self.config.resolver);
        info!(
            "Dependency graph has {} nodes and {} edges",
            graph.node_count(),
            graph.edge_count()
        );

        let mut clusters = cluster_files(&graph, &records, self.config.clustering);
        let layout =
            LayoutEngine::new(self.config.layout.clone()).generate(&records, &mut clusters, &graph);

        let model = assemble(name, &records, &graph, &clusters, &layout, self.config.max_roads);
        info!(
            "Built city {:?}: {} buildings, {} districts, {} roads in {} ms",
            model.name,
            model.buildings.len(),
            model.districts.len(),
            model.roads.len(),
            started.elapsed().as_millis()
        );
        model
    }
}

fn validate_root(root: &Path) -> CityResult<PathBuf> {
    if !root.is_dir() {
        return Err(CityError::InvalidRoot(root.to_path_buf()));
    }
    root.canonicalize()
        .map_err(|_| CityError::InvalidRoot(root.to_path_buf()))
}

fn city_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| root.display().to_string())
}

/// Combine parsed files, graph, districts and layout into the final model.
///
/// Degrees come from `graph` directly. At most `max_roads` edges become
/// roads, in graph order; when that cap binds the roads carry no path.
pub fn assemble(
    name: String,
    records: &[FileRecord],
    graph: &DependencyGraph,
    clusters: &[Cluster],
    layout: &CityLayout,
    max_roads: usize,
) -> CityModel {
    if records.is_empty() {
        return CityModel::empty(name);
    }

    let buildings: Vec<Building> = records
        .iter()
        .map(|record| Building {
            id: record.id.clone(),
            name: record.name.clone(),
            path: record.id.clone(),
            district_id: layout
                .file_districts
                .get(&record.id)
                .cloned()
                .unwrap_or_default(),
            position: layout.positions.get(&record.id).copied().unwrap_or_default(),
            dimensions: Dimensions::from_metrics(record.loc, record.complexity),
            metrics: BuildingMetrics {
                loc: record.loc,
                complexity: record.complexity,
                churn: record.churn,
                age_days: record.age_days,
                dependencies_in: graph.in_degree(&record.id),
                dependencies_out: graph.out_degree(&record.id),
            },
            language: record.language,
            decay_level: record.decay_level,
            is_hotspot: record.is_hotspot,
        })
        .collect();

    let districts: Vec<District> = clusters
        .iter()
        .map(|cluster| District {
            id: cluster.id.clone(),
            name: cluster.name.clone(),
            color: cluster.color.clone(),
            center: cluster.center,
            boundary: cluster.boundary.clone(),
            building_count: cluster.size(),
        })
        .collect();

    let capped = graph.edge_count() > max_roads;
    if capped {
        debug!(
            "Capping roads at {max_roads} of {} dependencies",
            graph.edge_count()
        );
    }
    let roads: Vec<Road> = graph
        .edges()
        .take(max_roads)
        .map(|(source, target, weight)| {
            let path = if capped {
                Vec::new()
            } else {
                layout
                    .edge_paths
                    .get(&(source.to_string(), target.to_string()))
                    .cloned()
                    .unwrap_or_default()
            };
            Road {
                source: source.to_string(),
                target: target.to_string(),
                weight,
                is_cross_district: layout.file_districts.get(source)
                    != layout.file_districts.get(target),
                path,
            }
        })
        .collect();

    let stats = CityStats {
        total_files: buildings.len(),
        total_loc: buildings.iter().map(|b| b.metrics.loc).sum(),
        total_districts: districts.len(),
        total_dependencies: graph.edge_count(),
        hotspots: buildings.iter().filter(|b| b.is_hotspot).count(),
    };

    CityModel {
        name,
        buildings,
        districts,
        roads,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::fs;

    use super::*;
    use crate::graph::analysis::percentile_threshold;
    use crate::store::cache::{CachePolicy, MemoryCache};

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, body).unwrap();
    }

    fn analyzer() -> CityAnalyzer {
        CityAnalyzer::new(AnalyzerConfig {
            max_files: 10,
            use_history: false,
            workers: 2,
            ..AnalyzerConfig::default()
        })
    }

    fn assert_well_formed(model: &CityModel) {
        let district_ids: HashSet<&str> = model.districts.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(district_ids.len(), model.districts.len());
        for building in &model.buildings {
            assert!(district_ids.contains(building.district_id.as_str()));
        }
        let counted: usize = model.districts.iter().map(|d| d.building_count).sum();
        assert_eq!(counted, model.buildings.len());
        for district in &model.districts {
            assert_eq!(model.buildings_in(&district.id).count(), district.building_count);
        }
    }

    #[test]
    fn test_chain_of_three_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.py", "import b\n");
        write(dir.path(), "b.py", "import c\n");
        write(dir.path(), "c.py", "x = 1\n");

        let analyzer = analyzer();
        let model = analyzer.analyze(dir.path()).unwrap();

        assert_eq!(model.buildings.len(), 3);
        assert_eq!(model.districts.len(), 1);
        // three nodes is enough to cluster; the chain forms one community
        assert_eq!(model.districts[0].id, "district_0");
        assert_eq!(model.districts[0].building_count, 3);
        assert_eq!(model.stats.total_dependencies, 2);
        assert_eq!(model.stats.total_files, 3);
        assert_eq!(model.stats.total_districts, 1);
        let edges: Vec<(&str, &str, u32)> = model
            .roads
            .iter()
            .map(|r| (r.source.as_str(), r.target.as_str(), r.weight))
            .collect();
        assert_eq!(edges, vec![("a.py", "b.py", 1), ("b.py", "c.py", 1)]);
        assert!(model.roads.iter().all(|r| !r.is_cross_district));
        assert_well_formed(&model);

        let report = analyzer.inspect(dir.path()).unwrap();
        assert_eq!(report.node_count, 3);
        assert_eq!(report.edge_count, 2);
        assert!(report.cycles.is_empty());
        // in-degrees a=0, b=1, c=1: sorted [0, 1, 1], index floor(3 * 0.95) = 2
        assert_eq!(percentile_threshold(&[0, 1, 1], GOD_OBJECT_PERCENTILE), Some(1));
        assert_eq!(report.god_objects, vec!["b.py", "c.py"]);
    }

    #[test]
    fn test_cyclic_pair() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "x.py", "import y\n");
        write(dir.path(), "y.py", "import x\n");

        let analyzer = analyzer();
        let report = analyzer.inspect(dir.path()).unwrap();
        assert_eq!(report.cycles.len(), 1);
        let mut cycle = report.cycles[0].clone();
        cycle.sort();
        assert_eq!(cycle, vec!["x.py", "y.py"]);

        let model = analyzer.analyze(dir.path()).unwrap();
        assert_eq!(model.districts.len(), 1);
        assert_eq!(model.districts[0].id, "main");
        assert_eq!(model.districts[0].name, "Main District");
        assert_eq!(model.roads.len(), 2);
        assert!(model.roads.iter().all(|r| r.weight == 1));
    }

    #[test]
    fn test_empty_directory_yields_empty_city() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "README.md", "# nothing to see\n");
        let model = analyzer().analyze(dir.path()).unwrap();
        assert!(model.buildings.is_empty());
        assert!(model.districts.is_empty());
        assert!(model.roads.is_empty());
        assert_eq!(model.stats, CityStats::default());
    }

    #[test]
    fn test_invalid_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert!(matches!(
            analyzer().analyze(&missing),
            Err(CityError::InvalidRoot(_))
        ));

        let file = dir.path().join("file.py");
        fs::write(&file, "x = 1\n").unwrap();
        assert!(matches!(
            analyzer().analyze(&file),
            Err(CityError::InvalidRoot(_))
        ));
    }

    #[test]
    fn test_degrees_match_roads() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "api/routes.py", "import handlers\nimport models\n");
        write(dir.path(), "api/handlers.py", "import models\nimport db\n");
        write(dir.path(), "core/models.py", "import db\n");
        write(dir.path(), "core/db.py", "import config\n");
        write(dir.path(), "core/config.py", "x = 1\n");
        write(dir.path(), "web/app.js", "import api from './util';\n");
        write(dir.path(), "web/util.js", "export const x = 1;\n");

        let model = analyzer().analyze(dir.path()).unwrap();
        assert_eq!(model.buildings.len(), 7);
        for building in &model.buildings {
            let incoming = model.roads.iter().filter(|r| r.target == building.id).count();
            let outgoing = model.roads.iter().filter(|r| r.source == building.id).count();
            assert_eq!(building.metrics.dependencies_in, incoming);
            assert_eq!(building.metrics.dependencies_out, outgoing);
        }
        assert_eq!(model.stats.total_dependencies, model.roads.len());
        assert_well_formed(&model);
    }

    #[test]
    fn test_road_cap_drops_paths() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.py", "import b\nimport c\n");
        write(dir.path(), "b.py", "import c\n");
        write(dir.path(), "c.py", "x = 1\n");

        let capped = CityAnalyzer::new(AnalyzerConfig {
            max_roads: 1,
            use_history: false,
            ..AnalyzerConfig::default()
        });
        let model = capped.analyze(dir.path()).unwrap();
        assert_eq!(model.roads.len(), 1);
        assert_eq!(
            (model.roads[0].source.as_str(), model.roads[0].target.as_str()),
            ("a.py", "b.py")
        );
        assert!(model.roads[0].path.is_empty());
        assert_eq!(model.stats.total_dependencies, 3);
        for building in &model.buildings {
            let expected = match building.id.as_str() {
                "a.py" => (0, 2),
                "b.py" => (1, 1),
                _ => (2, 0),
            };
            let metrics = &building.metrics;
            assert_eq!((metrics.dependencies_in, metrics.dependencies_out), expected);
        }

        let model = analyzer().analyze(dir.path()).unwrap();
        assert_eq!(model.roads.len(), 3);
        assert!(model.roads.iter().all(|r| r.path.len() == 2));
    }

    #[test]
    fn test_concurrent_runs_are_independent() {
        let chain = tempfile::tempdir().unwrap();
        write(chain.path(), "a.py", "import b\n");
        write(chain.path(), "b.py", "import c\n");
        write(chain.path(), "c.py", "x = 1\n");

        let pair = tempfile::tempdir().unwrap();
        write(pair.path(), "x.ts", "import { y } from './y';\n");
        write(pair.path(), "y.ts", "import { x } from './x';\n");

        let analyzer = analyzer();
        let (first, second) = std::thread::scope(|scope| {
            let first = scope.spawn(|| analyzer.analyze(chain.path()));
            let second = scope.spawn(|| analyzer.analyze(pair.path()));
            (first.join().unwrap(), second.join().unwrap())
        });
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(first.stats.total_files, 3);
        assert_eq!(first.stats.total_dependencies, 2);
        assert!(first.buildings.iter().all(|b| b.id.ends_with(".py")));
        assert_well_formed(&first);

        assert_eq!(second.stats.total_files, 2);
        assert_eq!(second.stats.total_dependencies, 2);
        assert!(second.buildings.iter().all(|b| b.id.ends_with(".ts")));
        assert_well_formed(&second);

        // same answers as sequential runs
        let again = analyzer.analyze(chain.path()).unwrap();
        assert_eq!(again.roads, first.roads);
        assert_eq!(again.districts.len(), first.districts.len());
    }

    #[test]
    fn test_cache_hit_returns_same_model() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.py", "import b\n");
        write(dir.path(), "b.py", "x = 1\n");

        let cache = Arc::new(MemoryCache::new(CachePolicy::new(4, None)));
        let analyzer = analyzer().with_cache(cache.clone());
        let first = analyzer.analyze(dir.path()).unwrap();
        let second = analyzer.analyze(dir.path()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len().unwrap(), 1);

        let key = analyzer.cache_key(dir.path()).unwrap();
        assert!(key.ends_with("::10"));
        assert!(cache.get(&key).unwrap().is_some());
    }

    #[test]
    fn test_tree_sitter_backend_builds_same_graph() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.py", "import b\n");
        write(dir.path(), "b.py", "import c\n");
        write(dir.path(), "c.py", "x = 1\n");

        let analyzer = CityAnalyzer::new(AnalyzerConfig {
            extractor: ExtractorBackend::TreeSitter,
            use_history: false,
            ..AnalyzerConfig::default()
        });
        let model = analyzer.analyze(dir.path()).unwrap();
        assert_eq!(model.stats.total_dependencies, 2);
    }

    #[test]
    fn test_parse_is_sorted_by_id() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "z.go", "package z\n");
        write(dir.path(), "m/a.ts", "export const a = 1;\n");
        write(dir.path(), "b.py", "x = 1\n");
        let ids: Vec<String> = analyzer()
            .parse(dir.path())
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["b.py", "m/a.ts", "z.go"]);
    }
}
