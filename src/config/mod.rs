//! Configuration: file format, discovery, and fleet construction.

mod loader;
mod types;

pub use loader::{build_fleet, config_search_paths, load_config};
pub use types::{ClusterConfig, FileConfig};
