//! Clustering engine: partitions files into named, coloured districts.

use indexmap::IndexMap;
use tracing::{debug, info};

use super::community::detect_communities;
use super::naming::{district_color, district_name};
use crate::config::ClusteringStrategy;
use crate::graph::DependencyGraph;
use crate::models::{FileRecord, Point2};

/// Graphs smaller than this collapse into one district.
pub const MIN_CLUSTER_NODES: usize = 3;

pub const SINGLE_DISTRICT_ID: &str = "main";
pub const SINGLE_DISTRICT_NAME: &str = "Main District";

const ROOT_GROUP: &str = "root";

/// A district before layout assigns its geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub id: String,
    pub name: String,
    pub color: String,
    /// Member file ids; non-empty and disjoint across clusters.
    pub files: Vec<String>,
    pub center: Point2,
    pub boundary: Vec<Point2>,
}

impl Cluster {
    pub fn size(&self) -> usize {
        self.files.len()
    }
}

fn single_district(records: &[FileRecord]) -> Vec<Cluster> {
    vec![Cluster {
        id: SINGLE_DISTRICT_ID.to_string(),
        name: SINGLE_DISTRICT_NAME.to_string(),
        color: district_color(0).to_string(),
        files: records.iter().map(|r| r.id.clone()).collect(),
        center: Point2::ORIGIN,
        boundary: Vec::new(),
    }]
}

/// Group by top-level directory; files at the root share one group.
/// Groups are numbered by first appearance.
pub fn directory_assignments(records: &[FileRecord]) -> IndexMap<String, usize> {
    let mut groups: IndexMap<&str, usize> = IndexMap::new();
    let mut assignments = IndexMap::with_capacity(records.len());
    for record in records {
        let key = match record.id.split_once('/') {
            Some((top, _)) => top,
            None => ROOT_GROUP,
        };
        let next = groups.len();
        let group = *groups.entry(key).or_insert(next);
        assignments.insert(record.id.clone(), group);
    }
    assignments
}

fn modularity_assignments(graph: &DependencyGraph) -> Option<IndexMap<String, usize>> {
    let partition = detect_communities(graph)?;
    debug!(
        "Modularity partition: {} communities, Q = {:.4}",
        partition.community_count, partition.modularity
    );
    Some(
        graph
            .nodes()
            .zip(partition.assignments)
            .map(|(id, c)| (id.to_string(), c))
            .collect(),
    )
}

/// Turn cluster assignments into named districts. Clusters are emitted in
/// order of their first member in `records`; unassigned files join cluster 0.
fn enrich(assignments: &IndexMap<String, usize>, records: &[FileRecord]) -> Vec<Cluster> {
    let mut grouped: IndexMap<usize, Vec<&FileRecord>> = IndexMap::new();
    for record in records {
        let cluster = assignments.get(&record.id).copied().unwrap_or(0);
        grouped.entry(cluster).or_default().push(record);
    }

    grouped
        .into_iter()
        .map(|(cluster, members)| {
            let ids: Vec<&str> = members.iter().map(|r| r.id.as_str()).collect();
            let names: Vec<&str> = members.iter().map(|r| r.name.as_str()).collect();
            Cluster {
                id: format!("district_{cluster}"),
                name: district_name(&ids, &names),
                color: district_color(cluster).to_string(),
                files: ids.iter().map(|s| s.to_string()).collect(),
                center: Point2::ORIGIN,
                boundary: Vec::new(),
            }
        })
        .collect()
}

/// Partition `records` into districts.
pub fn cluster_files(
    graph: &DependencyGraph,
    records: &[FileRecord],
    strategy: ClusteringStrategy,
) -> Vec<Cluster> {
    if records.is_empty() {
        return Vec::new();
    }
    if graph.node_count() < MIN_CLUSTER_NODES {
        return single_district(records);
    }

    let assignments = match strategy {
        ClusteringStrategy::Modularity => modularity_assignments(graph).unwrap_or_else(|| {
            debug!("Modularity undefined for an edgeless graph, clustering by directory");
            directory_assignments(records)
        }),
        ClusteringStrategy::Directory => directory_assignments(records),
    };

    let clusters = enrich(&assignments, records);
    info!("Clustered {} files into {} districts", records.len(), clusters.len());
    clusters
}
