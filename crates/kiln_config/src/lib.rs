//! Project configuration (`kiln.toml`) parsing and validation.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_file, load_config_from_str, CONFIG_FILE};
pub use types::{CacheConfig, HashConfig, KilnConfig, ProjectMeta, RunConfig, TargetConfig};
