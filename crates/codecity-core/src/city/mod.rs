//! From dependency graph to city: districts, geometry and roads.

pub mod clustering;
pub mod community;
pub mod layout;
pub mod naming;
pub mod voronoi;

pub use clustering::{cluster_files, Cluster};
pub use layout::{CityLayout, LayoutEngine};
