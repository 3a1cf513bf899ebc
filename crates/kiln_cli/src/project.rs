//! Project discovery and the config-to-plan translation shared by every
//! subcommand.

use std::path::{Path, PathBuf};

use kiln_cache::Cache;
use kiln_common::Format;
use kiln_config::{ConfigError, KilnConfig, CONFIG_FILE};
use kiln_exec::Scheduler;
use kiln_plan::{Plan, Target};

use crate::shell::shell_command;
use crate::GlobalArgs;

/// A loaded project: its root directory and validated configuration.
pub struct Project {
    /// Directory containing `kiln.toml`; commands run and files resolve here.
    pub root: PathBuf,
    /// Parsed configuration.
    pub config: KilnConfig,
}

impl Project {
    /// Locates and loads the project selected by the global flags.
    ///
    /// `--config` may name a file or a directory containing `kiln.toml`.
    /// Without it, the current directory and its parents are searched.
    pub fn load(global: &GlobalArgs) -> Result<Self, Box<dyn std::error::Error>> {
        let (root, file) = match global.config {
            Some(ref config_path) => {
                let p = PathBuf::from(config_path);
                if p.is_file() {
                    let root = p
                        .parent()
                        .filter(|parent| !parent.as_os_str().is_empty())
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| PathBuf::from("."));
                    (root, p)
                } else {
                    let file = p.join(CONFIG_FILE);
                    (p, file)
                }
            }
            None => {
                let root = find_project_root(&std::env::current_dir()?)?;
                let file = root.join(CONFIG_FILE);
                (root, file)
            }
        };
        let config = kiln_config::load_config_file(&file)?;
        tracing::debug!(root = %root.display(), project = %config.project.name, "loaded project");
        Ok(Self { root, config })
    }

    /// Opens the configured cache; relative paths resolve against the root.
    pub fn cache(&self) -> Result<Cache, kiln_cache::StorageError> {
        let path = self.config.cache.path_in(&self.root);
        Cache::open(self.config.cache.backend, &path)
    }

    /// Translates the configured targets into a plan of shell commands.
    pub fn plan(&self) -> Result<Plan, ConfigError> {
        build_plan(&self.config, &self.root)
    }

    /// A scheduler configured from `[run]` and `[hash]`.
    pub fn scheduler(&self, cache: Cache) -> Scheduler {
        Scheduler::new(cache)
            .workers(self.config.run.workers)
            .keep_going(self.config.run.keep_going)
            .algorithm(self.config.hash.algorithm)
            .root(&self.root)
    }
}

/// Walks up from `start` looking for the nearest directory containing
/// `kiln.toml`.
pub fn find_project_root(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Builds a plan whose commands run in `root`. Shell targets store their
/// output as `raw` unless a format is configured.
pub fn build_plan(config: &KilnConfig, root: &Path) -> Result<Plan, ConfigError> {
    let mut plan = Plan::new();
    for entry in &config.targets {
        let format = entry.format.unwrap_or(Format::Raw);
        let mut target =
            Target::with_command(&entry.name, shell_command(&entry.command, root, format))
                .format(format);
        for path in &entry.file_in {
            target = target.file_in(path.clone());
        }
        for path in &entry.file_out {
            target = target.file_out(path.clone());
        }
        for dep in &entry.deps {
            target = target.depends_on(dep.clone());
        }
        if let Some(transform) = entry.transform()? {
            target = target.transform(transform);
        }
        plan.add(target);
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_config::load_config_from_str;
    use kiln_plan::Transform;

    const TUNING: &str = r#"
[project]
name = "tuning"

[[target]]
name = "data"
command = "cat data.csv"
file_in = ["data.csv"]

[[target]]
name = "model"
command = "echo fit ${units} ${data}"
format = "json"
map = { units = [16, 32] }

[[target]]
name = "combined"
command = "echo ${model}"
combine = "model"
deps = ["data"]
"#;

    #[test]
    fn plan_mirrors_config() {
        let config = load_config_from_str(TUNING).unwrap();
        let plan = build_plan(&config, Path::new(".")).unwrap();
        let targets = plan.targets();
        assert_eq!(targets.len(), 3);
        assert_eq!(targets[0].file_inputs(), &[PathBuf::from("data.csv")]);
        assert_eq!(targets[0].storage_format(), Format::Raw);
        assert_eq!(targets[1].storage_format(), Format::Json);
        assert!(matches!(targets[1].template_transform(), Some(Transform::Map(_))));
        assert_eq!(targets[2].deps(), &["data".to_string()]);
        assert_eq!(
            targets[2].template_transform(),
            Some(&Transform::combine("model"))
        );

        let expanded = plan.expand().unwrap();
        let names: Vec<_> = expanded.targets().iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["data", "model_16", "model_32", "combined"]);
        assert_eq!(expanded.get("model_32").unwrap().text(), "echo fit 32 ${data}");
    }

    #[test]
    fn finds_root_in_parent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[project]\nname = \"p\"\n").unwrap();
        let nested = dir.path().join("analysis").join("notebooks");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_project_root(&nested).unwrap(), dir.path());

        let elsewhere = tempfile::tempdir().unwrap();
        assert!(find_project_root(elsewhere.path()).is_err());
    }

    #[test]
    fn load_from_explicit_config_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(CONFIG_FILE);
        std::fs::write(&file, "[project]\nname = \"explicit\"\n[cache]\nbackend = \"db\"\n")
            .unwrap();
        for arg in [file.clone(), dir.path().to_path_buf()] {
            let global = GlobalArgs {
                quiet: true,
                verbose: false,
                color: false,
                config: Some(arg.display().to_string()),
            };
            let project = Project::load(&global).unwrap();
            assert_eq!(project.root, dir.path());
            assert_eq!(project.config.project.name, "explicit");
            let cache = project.cache().unwrap();
            assert_eq!(cache.kind(), kiln_cache::BackendKind::Db);
        }
        assert!(dir.path().join(".kiln").join("cache.db").exists());
    }
}
