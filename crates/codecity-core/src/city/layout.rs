//! Layout engine: district placement, building grids, district boundaries
//! and bundled road paths.
//!
//! Every "random" offset is derived from a CRC32 of the district or file id,
//! so a fixed input always produces the same city.

use std::f64::consts::PI;

use indexmap::IndexMap;
use tracing::debug;

use super::clustering::Cluster;
use super::voronoi::{clip_to_extent, voronoi_cells, Cell};
use crate::config::LayoutConfig;
use crate::graph::DependencyGraph;
use crate::models::{FileRecord, Point2, Point3};

const ANGULAR_JITTER: f64 = 0.2;
const RADIUS_SCALE: f64 = 0.7;
const MAX_SIZE_FACTOR: f64 = 2.0;
const SIZE_FACTOR_DIVISOR: f64 = 20.0;

const SQUARE_BASE_HALF_SIZE: f64 = 30.0;
const SQUARE_HALF_SIZE_PER_FILE: f64 = 2.0;
const UNBOUNDED_CELL_HALF_SIZE: f64 = 40.0;
const MIN_VORONOI_DISTRICTS: usize = 3;

const CROSS_ROAD_HEIGHT: f64 = 2.0;
const CROSS_ROAD_APEX: f64 = 15.0;
const LOCAL_ROAD_HEIGHT: f64 = 0.5;

/// Symmetric offset in `[-amplitude, amplitude]` derived from `key`.
fn jitter(key: &str, salt: u8, amplitude: f64) -> f64 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(key.as_bytes());
    hasher.update(&[salt]);
    let unit = f64::from(hasher.finalize()) / f64::from(u32::MAX);
    (unit * 2.0 - 1.0) * amplitude
}

fn square(center: Point2, half: f64) -> Vec<Point2> {
    vec![
        Point2::new(center.x - half, center.y - half),
        Point2::new(center.x + half, center.y - half),
        Point2::new(center.x + half, center.y + half),
        Point2::new(center.x - half, center.y + half),
    ]
}

/// Everything layout computes, keyed by district or file id.
#[derive(Debug, Clone, Default)]
pub struct CityLayout {
    pub positions: IndexMap<String, Point3>,
    pub district_centers: IndexMap<String, Point2>,
    pub district_boundaries: IndexMap<String, Vec<Point2>>,
    pub edge_paths: IndexMap<(String, String), Vec<Point3>>,
    /// file id -> district id
    pub file_districts: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct LayoutEngine {
    config: LayoutConfig,
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    /// Lay out the city and write centers and boundaries back into
    /// `clusters`.
    pub fn generate(
        &self,
        records: &[FileRecord],
        clusters: &mut [Cluster],
        graph: &DependencyGraph,
    ) -> CityLayout {
        let file_districts = file_districts(clusters);
        let district_centers = self.layout_districts(clusters);
        let positions = self.layout_buildings(records, &file_districts, &district_centers);
        let district_boundaries = self.generate_boundaries(clusters, &district_centers);
        let edge_paths = bundle_edges(graph, &positions, &file_districts);

        for cluster in clusters.iter_mut() {
            if let Some(center) = district_centers.get(&cluster.id) {
                cluster.center = *center;
            }
            if let Some(boundary) = district_boundaries.get(&cluster.id) {
                cluster.boundary = boundary.clone();
            }
        }

        CityLayout {
            positions,
            district_centers,
            district_boundaries,
            edge_paths,
            file_districts,
        }
    }

    /// Centers on a circle, radius scaled by district size.
    pub fn layout_districts(&self, clusters: &[Cluster]) -> IndexMap<String, Point2> {
        let mut centers = IndexMap::new();
        match clusters {
            [] => {}
            [only] => {
                centers.insert(only.id.clone(), Point2::ORIGIN);
            }
            _ => {
                let radius = self.config.city_size / 3.0;
                let angle_step = 2.0 * PI / clusters.len() as f64;
                for (i, cluster) in clusters.iter().enumerate() {
                    let angle = i as f64 * angle_step + jitter(&cluster.id, 0, ANGULAR_JITTER);
                    let size_factor =
                        MAX_SIZE_FACTOR.min(1.0 + cluster.size() as f64 / SIZE_FACTOR_DIVISOR);
                    let r = radius * size_factor * RADIUS_SCALE;
                    centers.insert(
                        cluster.id.clone(),
                        Point2::new(r * angle.cos(), r * angle.sin()),
                    );
                }
            }
        }
        centers
    }

    /// Square grid per district, centered on the district center, at
    /// ground level.
    pub fn layout_buildings(
        &self,
        records: &[FileRecord],
        file_districts: &IndexMap<String, String>,
        district_centers: &IndexMap<String, Point2>,
    ) -> IndexMap<String, Point3> {
        let mut grouped: IndexMap<Option<&str>, Vec<&FileRecord>> = IndexMap::new();
        for record in records {
            let district = file_districts.get(&record.id).map(String::as_str);
            grouped.entry(district).or_default().push(record);
        }

        let cell = self.config.building_spacing * 2.0;
        let mut positions = IndexMap::with_capacity(records.len());
        for (district, files) in grouped {
            let center = district
                .and_then(|d| district_centers.get(d))
                .copied()
                .unwrap_or(Point2::ORIGIN);
            let grid = (files.len() as f64).sqrt().ceil().max(1.0) as usize;
            let offset_x = center.x - (grid as f64 * cell) / 2.0;
            let offset_z = center.y - (grid as f64 * cell) / 2.0;

            for (i, record) in files.iter().enumerate() {
                let (row, col) = (i / grid, i % grid);
                positions.insert(
                    record.id.clone(),
                    Point3::new(
                        offset_x + col as f64 * cell + jitter(&record.id, 1, cell / 4.0),
                        0.0,
                        offset_z + row as f64 * cell + jitter(&record.id, 2, cell / 4.0),
                    ),
                );
            }
        }
        positions
    }

    fn square_boundary(&self, cluster: &Cluster, center: Point2) -> Vec<Point2> {
        square(
            center,
            SQUARE_BASE_HALF_SIZE + cluster.size() as f64 * SQUARE_HALF_SIZE_PER_FILE,
        )
    }

    /// Voronoi cells over district centers plus four far bounding sites,
    /// clipped to the city extent. Squares when tessellation is disabled or
    /// there are too few districts.
    pub fn generate_boundaries(
        &self,
        clusters: &[Cluster],
        district_centers: &IndexMap<String, Point2>,
    ) -> IndexMap<String, Vec<Point2>> {
        let center_of = |c: &Cluster| district_centers.get(&c.id).copied().unwrap_or(Point2::ORIGIN);

        if clusters.len() < MIN_VORONOI_DISTRICTS || !self.config.voronoi {
            return clusters
                .iter()
                .map(|c| (c.id.clone(), self.square_boundary(c, center_of(c))))
                .collect();
        }

        let placed: Vec<(&Cluster, Point2)> = clusters
            .iter()
            .filter_map(|c| district_centers.get(&c.id).map(|p| (c, *p)))
            .collect();
        if placed.len() < MIN_VORONOI_DISTRICTS {
            return IndexMap::new();
        }

        let margin = self.config.city_size * 2.0;
        let mut sites: Vec<Point2> = placed.iter().map(|(_, p)| *p).collect();
        sites.extend([
            Point2::new(-margin, -margin),
            Point2::new(margin, -margin),
            Point2::new(margin, margin),
            Point2::new(-margin, margin),
        ]);
        let cells = voronoi_cells(&sites, margin * 2.0);

        placed
            .iter()
            .zip(cells)
            .map(|((cluster, center), cell)| {
                let boundary = match cell {
                    Cell::Bounded(polygon) => clip_to_extent(&polygon, self.config.city_size),
                    Cell::Unbounded => {
                        debug!("Unbounded cell for {}, using square", cluster.id);
                        square(*center, UNBOUNDED_CELL_HALF_SIZE)
                    }
                };
                (cluster.id.clone(), boundary)
            })
            .collect()
    }
}

/// file id -> owning district id.
pub fn file_districts(clusters: &[Cluster]) -> IndexMap<String, String> {
    clusters
        .iter()
        .flat_map(|c| c.files.iter().map(move |f| (f.clone(), c.id.clone())))
        .collect()
}

/// Road polylines: cross-district edges arc over an elevated midpoint,
/// local edges run straight just above ground. Edges with an unplaced
/// endpoint are skipped.
pub fn bundle_edges(
    graph: &DependencyGraph,
    positions: &IndexMap<String, Point3>,
    file_districts: &IndexMap<String, String>,
) -> IndexMap<(String, String), Vec<Point3>> {
    let mut paths = IndexMap::new();
    for (source, target, _) in graph.edges() {
        let (Some(src), Some(tgt)) = (positions.get(source), positions.get(target)) else {
            continue;
        };
        let cross = file_districts.get(source) != file_districts.get(target);
        let path = if cross {
            vec![
                Point3::new(src.x, CROSS_ROAD_HEIGHT, src.z),
                Point3::new((src.x + tgt.x) / 2.0, CROSS_ROAD_APEX, (src.z + tgt.z) / 2.0),
                Point3::new(tgt.x, CROSS_ROAD_HEIGHT, tgt.z),
            ]
        } else {
            vec![
                Point3::new(src.x, LOCAL_ROAD_HEIGHT, src.z),
                Point3::new(tgt.x, LOCAL_ROAD_HEIGHT, tgt.z),
            ]
        };
        paths.insert((source.to_string(), target.to_string()), path);
    }
    paths
}
