//! Configuration types deserialized from `kiln.toml`.

use std::path::{Path, PathBuf};

use kiln_cache::BackendKind;
use kiln_common::{Format, HashAlgorithm};
use kiln_plan::{Param, ParamValues, Transform};
use serde::Deserialize;

use crate::error::ConfigError;

/// The top-level configuration parsed from `kiln.toml`.
#[derive(Debug, Deserialize)]
pub struct KilnConfig {
    /// Project metadata.
    pub project: ProjectMeta,
    /// Cache backend selection.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Scheduler settings.
    #[serde(default)]
    pub run: RunConfig,
    /// Fingerprint settings.
    #[serde(default)]
    pub hash: HashConfig,
    /// Targets and templates, in plan order.
    #[serde(default, rename = "target")]
    pub targets: Vec<TargetConfig>,
}

impl KilnConfig {
    /// Looks up a declared target or template by name.
    pub fn target(&self, name: &str) -> Result<&TargetConfig, ConfigError> {
        self.targets
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| ConfigError::UnknownTarget(name.to_string()))
    }
}

/// Core project metadata.
#[derive(Debug, Deserialize)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
    /// A brief description of the project.
    #[serde(default)]
    pub description: String,
}

/// `[cache]`: which backend to use and where.
#[derive(Debug, Default, Deserialize)]
pub struct CacheConfig {
    /// Backend kind (`dir`, `db` or `memory`).
    #[serde(default)]
    pub backend: BackendKind,
    /// Directory (dir) or file (db). Defaults depend on the backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl CacheConfig {
    /// The configured path, or the backend's default: `.kiln` for a
    /// directory, `.kiln/cache.db` for a database file.
    pub fn resolved_path(&self) -> PathBuf {
        match (&self.path, self.backend) {
            (Some(path), _) => path.clone(),
            (None, BackendKind::Db) => PathBuf::from(".kiln").join("cache.db"),
            (None, _) => PathBuf::from(".kiln"),
        }
    }

    /// [`resolved_path`](Self::resolved_path) joined onto the project
    /// directory; absolute paths are returned unchanged.
    pub fn path_in(&self, root: &Path) -> PathBuf {
        root.join(self.resolved_path())
    }
}

/// `[run]`: scheduler settings.
#[derive(Debug, Deserialize)]
pub struct RunConfig {
    /// Worker threads; `0` means the available parallelism.
    #[serde(default)]
    pub workers: usize,
    /// Keep building independent branches after a failure.
    #[serde(default = "default_keep_going")]
    pub keep_going: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            keep_going: default_keep_going(),
        }
    }
}

fn default_keep_going() -> bool {
    true
}

/// `[hash]`: fingerprint algorithm.
#[derive(Debug, Default, Deserialize)]
pub struct HashConfig {
    /// `xxh3` (default) or `sha256`.
    #[serde(default)]
    pub algorithm: HashAlgorithm,
}

/// One `[[target]]` entry: a plain target or a template.
#[derive(Debug, Deserialize)]
pub struct TargetConfig {
    /// Target (or template) name.
    pub name: String,
    /// Shell command; its stdout becomes the target's value.
    pub command: String,
    /// Declared input files.
    #[serde(default)]
    pub file_in: Vec<PathBuf>,
    /// Declared output files.
    #[serde(default)]
    pub file_out: Vec<PathBuf>,
    /// Storage format hint. Shell targets default to `raw`.
    #[serde(default)]
    pub format: Option<Format>,
    /// Explicit dependencies.
    #[serde(default)]
    pub deps: Vec<String>,
    /// Co-varying parameters: `{ name = [values] }` or `{ name = "group" }`.
    #[serde(default)]
    pub map: Option<toml::Table>,
    /// Cartesian parameters, same shape as `map`.
    #[serde(default)]
    pub cross: Option<toml::Table>,
    /// Group to combine.
    #[serde(default)]
    pub combine: Option<String>,
    /// Parameter to partition a combine by.
    #[serde(default)]
    pub by: Option<String>,
}

impl TargetConfig {
    /// Converts the `map`/`cross`/`combine` keys into a [`Transform`].
    pub fn transform(&self) -> Result<Option<Transform>, ConfigError> {
        if let Some(table) = &self.map {
            return Ok(Some(Transform::Map(self.params(table)?)));
        }
        if let Some(table) = &self.cross {
            return Ok(Some(Transform::Cross(self.params(table)?)));
        }
        Ok(self.combine.as_ref().map(|group| Transform::Combine {
            group: group.clone(),
            by: self.by.clone(),
        }))
    }

    fn params(&self, table: &toml::Table) -> Result<Vec<Param>, ConfigError> {
        table
            .iter()
            .map(|(name, value)| {
                let values = match value {
                    toml::Value::String(group) => ParamValues::Group(group.clone()),
                    toml::Value::Array(items) => ParamValues::Literal(
                        items
                            .iter()
                            .map(|item| scalar(item).ok_or_else(|| self.bad_param(name)))
                            .collect::<Result<_, _>>()?,
                    ),
                    _ => return Err(self.bad_param(name)),
                };
                Ok(Param {
                    name: name.clone(),
                    values,
                })
            })
            .collect()
    }

    fn bad_param(&self, param: &str) -> ConfigError {
        ConfigError::ValidationError(format!(
            "target '{}': parameter '{param}' must be an array of scalars or a group name",
            self.name
        ))
    }
}

fn scalar(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}
