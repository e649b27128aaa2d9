//! Shared typed models used across the indexing, graph, and layout stages.
//!
//! [`FileRecord`] is the per-file output of the parse stage and never leaves
//! the pipeline. [`CityModel`] and everything it contains is the sole artifact
//! handed to callers; it is serialisable so that request layers and caches can
//! project it without touching pipeline-internal state.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Hotspot / decay contract constants
// ---------------------------------------------------------------------------

pub const HOTSPOT_COMPLEXITY_THRESHOLD: u32 = 15;
pub const HOTSPOT_CHURN_THRESHOLD: u32 = 8;
pub const HOTSPOT_LOC_THRESHOLD: usize = 500;

/// Age at which a file is considered fully decayed (two years).
pub const DECAY_SATURATION_DAYS: f64 = 730.0;

/// A file is a hotspot iff it is complex and either churning or large.
pub fn is_hotspot(complexity: u32, churn: u32, loc: usize) -> bool {
    complexity > HOTSPOT_COMPLEXITY_THRESHOLD
        && (churn > HOTSPOT_CHURN_THRESHOLD || loc > HOTSPOT_LOC_THRESHOLD)
}

/// Normalise an age in days to `[0, 1]`, saturating at two years.
pub fn decay_level(age_days: u32) -> f64 {
    (f64::from(age_days) / DECAY_SATURATION_DAYS).min(1.0)
}

// ---------------------------------------------------------------------------
// Language
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    Typescript,
    Java,
    Go,
    Rust,
    Cpp,
    C,
    Ruby,
    Php,
    Swift,
    Kotlin,
    Scala,
    Csharp,
    Unknown,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Typescript => "typescript",
            Language::Java => "java",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Cpp => "cpp",
            Language::C => "c",
            Language::Ruby => "ruby",
            Language::Php => "php",
            Language::Swift => "swift",
            Language::Kotlin => "kotlin",
            Language::Scala => "scala",
            Language::Csharp => "csharp",
            Language::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// A point on the ground plane (district centers and boundaries).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const ORIGIN: Point2 = Point2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A point in city space; `y` is height above ground.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
    pub depth: f64,
}

impl Dimensions {
    /// Footprint grows with line count, height with complexity; both clamped.
    pub fn from_metrics(loc: usize, complexity: u32) -> Self {
        let footprint = (loc as f64 / 100.0).clamp(2.0, 10.0);
        let height = (f64::from(complexity) * 0.8).clamp(1.0, 25.0);
        Self {
            width: footprint,
            height,
            depth: footprint,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-file structure and records
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSymbol {
    pub name: String,
    pub base: Option<String>,
    pub line: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSymbol {
    pub name: String,
    pub line: usize,
}

/// Secondary structure extracted alongside imports.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FileStructure {
    pub classes: Vec<ClassSymbol>,
    pub functions: Vec<FunctionSymbol>,
    pub exports: Vec<String>,
    /// Ratio of comment lines to total lines.
    pub comment_density: f64,
}

impl FileStructure {
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }
}

/// A parsed source file. Created once by the parse stage, read-only afterward.
#[derive(Clone, Debug, PartialEq)]
pub struct FileRecord {
    /// Root-relative, `/`-separated path.
    pub id: String,
    pub name: String,
    pub language: Language,
    /// Truncated content snapshot.
    pub content: String,
    pub loc: usize,
    pub complexity: u32,
    pub age_days: u32,
    pub churn: u32,
    /// Normalised but unresolved import strings, sorted and deduplicated.
    pub imports: Vec<String>,
    pub structure: FileStructure,
    pub is_hotspot: bool,
    pub decay_level: f64,
}

// ---------------------------------------------------------------------------
// City model
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingMetrics {
    pub loc: usize,
    pub complexity: u32,
    pub churn: u32,
    pub age_days: u32,
    pub dependencies_in: usize,
    pub dependencies_out: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub id: String,
    pub name: String,
    pub path: String,
    pub district_id: String,
    pub position: Point3,
    pub dimensions: Dimensions,
    pub metrics: BuildingMetrics,
    pub language: Language,
    pub decay_level: f64,
    pub is_hotspot: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct District {
    pub id: String,
    pub name: String,
    pub color: String,
    pub center: Point2,
    /// Ordered polygon vertices; empty for degenerate cases.
    pub boundary: Vec<Point2>,
    pub building_count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Road {
    pub source: String,
    pub target: String,
    pub weight: u32,
    pub is_cross_district: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<Point3>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityStats {
    pub total_files: usize,
    pub total_loc: usize,
    pub total_districts: usize,
    pub total_dependencies: usize,
    pub hotspots: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CityModel {
    pub name: String,
    pub buildings: Vec<Building>,
    pub districts: Vec<District>,
    pub roads: Vec<Road>,
    pub stats: CityStats,
}

impl CityModel {
    /// A well-defined model for an input with no parseable files.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            buildings: Vec::new(),
            districts: Vec::new(),
            roads: Vec::new(),
            stats: CityStats::default(),
        }
    }

    pub fn building(&self, id: &str) -> Option<&Building> {
        self.buildings.iter().find(|b| b.id == id)
    }

    pub fn district(&self, id: &str) -> Option<&District> {
        self.districts.iter().find(|d| d.id == id)
    }

    pub fn buildings_in<'a>(&'a self, district_id: &'a str) -> impl Iterator<Item = &'a Building> {
        self.buildings
            .iter()
            .filter(move |b| b.district_id == district_id)
    }
}
