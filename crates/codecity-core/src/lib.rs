//! codecity core library: turns a source tree into a navigable city model.
//!
//! Files become buildings sized by their metrics, clusters of tightly
//! coupled files become districts, and resolved imports become roads.
//! [`CityAnalyzer`] runs the whole pipeline; the modules below expose each
//! stage on its own.

pub mod analyzer;
pub mod city;
pub mod config;
pub mod errors;
pub mod graph;
pub mod indexer;
pub mod models;
pub mod store;

pub use analyzer::{graph_report, CityAnalyzer, GraphReport};
pub use config::{AnalyzerConfig, LayoutConfig, ResolverConfig};
pub use errors::{CityError, CityResult};
pub use models::CityModel;
pub use store::{CachePolicy, CityCache, MemoryCache, SqliteCache};
