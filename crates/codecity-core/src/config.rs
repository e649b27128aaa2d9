//! Analyzer configuration, fixed pipeline limits, and environment overrides.

use serde::{Deserialize, Serialize};
use tracing::warn;

// Pipeline guards
pub const DEFAULT_MAX_FILES: usize = 1000;
pub const MAX_FILE_BYTES: u64 = 500_000;
pub const MAX_WORKERS: usize = 8;
pub const PARSE_BATCH_SIZE: usize = 50;
pub const CONTENT_SNAPSHOT_CHARS: usize = 5000;
pub const CHURN_WINDOW_DAYS: u32 = 90;
pub const MAX_ROADS: usize = 500;
pub const HISTORY_COMMIT_LIMIT: usize = 20_000;
pub const MAX_CYCLES: usize = 10;
pub const GOD_OBJECT_PERCENTILE: f64 = 95.0;

// Layout guards
pub const CITY_SIZE: f64 = 500.0;
pub const BUILDING_SPACING: f64 = 8.0;

pub fn clamp_int(value: usize, minimum: usize, maximum: usize) -> usize {
    value.max(minimum).min(maximum)
}

/// Which structure extractor the parse stage uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractorBackend {
    #[default]
    Regex,
    TreeSitter,
}

/// Which partitioning the clustering engine attempts first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClusteringStrategy {
    #[default]
    Modularity,
    Directory,
}

/// Tie-breaking used by the suffix-scan resolution fallback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuffixMode {
    /// First index entry in insertion order.
    FirstMatch,
    /// Shortest matching file id, ties broken lexicographically.
    ShortestMatch,
}

/// One step of import resolution; steps run in the configured order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionStrategy {
    Exact,
    ExtensionAugmented,
    Relative,
    SuffixScan(SuffixMode),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    pub strategies: Vec<ResolutionStrategy>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            strategies: vec![
                ResolutionStrategy::Exact,
                ResolutionStrategy::ExtensionAugmented,
                ResolutionStrategy::Relative,
                ResolutionStrategy::SuffixScan(SuffixMode::FirstMatch),
            ],
        }
    }
}

impl ResolverConfig {
    /// Every strategy except the suffix scan.
    pub fn strict() -> Self {
        Self {
            strategies: vec![
                ResolutionStrategy::Exact,
                ResolutionStrategy::ExtensionAugmented,
                ResolutionStrategy::Relative,
            ],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub city_size: f64,
    pub building_spacing: f64,
    /// Disable to always emit square district boundaries.
    pub voronoi: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            city_size: CITY_SIZE,
            building_spacing: BUILDING_SPACING,
            voronoi: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    pub max_files: usize,
    pub max_file_bytes: u64,
    pub workers: usize,
    pub batch_size: usize,
    pub content_snapshot_chars: usize,
    pub churn_window_days: u32,
    pub max_roads: usize,
    pub use_history: bool,
    pub history_commit_limit: usize,
    pub extractor: ExtractorBackend,
    pub clustering: ClusteringStrategy,
    pub layout: LayoutConfig,
    pub resolver: ResolverConfig,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            max_files: DEFAULT_MAX_FILES,
            max_file_bytes: MAX_FILE_BYTES,
            workers: clamp_int(cpus, 1, MAX_WORKERS),
            batch_size: PARSE_BATCH_SIZE,
            content_snapshot_chars: CONTENT_SNAPSHOT_CHARS,
            churn_window_days: CHURN_WINDOW_DAYS,
            max_roads: MAX_ROADS,
            use_history: true,
            history_commit_limit: HISTORY_COMMIT_LIMIT,
            extractor: ExtractorBackend::default(),
            clustering: ClusteringStrategy::default(),
            layout: LayoutConfig::default(),
            resolver: ResolverConfig::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Defaults overlaid with `CODECITY_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup (the environment in
    /// production, a map in tests).
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_usize(&lookup, "CODECITY_MAX_FILES") {
            self.max_files = v;
        }
        if let Some(v) = parse_usize(&lookup, "CODECITY_WORKERS") {
            self.workers = v;
        }
        if let Some(v) = parse_usize(&lookup, "CODECITY_BATCH_SIZE") {
            self.batch_size = v;
        }
        if let Some(v) = parse_usize(&lookup, "CODECITY_MAX_ROADS") {
            self.max_roads = v;
        }
        if let Some(raw) = lookup("CODECITY_USE_GIT") {
            let v = raw.trim().to_lowercase();
            self.use_history = !matches!(v.as_str(), "0" | "false" | "no" | "off");
        }
        if let Some(raw) = lookup("CODECITY_EXTRACTOR") {
            match raw.trim().to_lowercase().as_str() {
                "regex" => self.extractor = ExtractorBackend::Regex,
                "tree-sitter" | "treesitter" => self.extractor = ExtractorBackend::TreeSitter,
                other => warn!("Ignoring unknown CODECITY_EXTRACTOR value: {other}"),
            }
        }
        if let Some(raw) = lookup("CODECITY_CLUSTERING") {
            match raw.trim().to_lowercase().as_str() {
                "modularity" => self.clustering = ClusteringStrategy::Modularity,
                "directory" => self.clustering = ClusteringStrategy::Directory,
                other => warn!("Ignoring unknown CODECITY_CLUSTERING value: {other}"),
            }
        }
        self.normalized()
    }

    /// Clamp counts that must stay positive.
    pub fn normalized(mut self) -> Self {
        self.max_files = self.max_files.max(1);
        self.workers = self.workers.max(1);
        self.batch_size = self.batch_size.max(1);
        self
    }
}

fn parse_usize<F>(lookup: &F, key: &str) -> Option<usize>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<usize>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring unparseable {key} value: {raw:?}");
            None
        }
    }
}
