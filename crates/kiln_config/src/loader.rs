//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::KilnConfig;
use kiln_cache::BackendKind;
use std::path::Path;

/// Name of the configuration file looked up in a project directory.
pub const CONFIG_FILE: &str = "kiln.toml";

/// Loads and validates `<project_dir>/kiln.toml`.
pub fn load_config(project_dir: &Path) -> Result<KilnConfig, ConfigError> {
    load_config_file(&project_dir.join(CONFIG_FILE))
}

/// Loads and validates a configuration file at an explicit path.
///
/// Relative paths in the file are checked against the file's directory.
pub fn load_config_file(path: &Path) -> Result<KilnConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = load_config_from_str(&content)?;
    let root = path.parent().unwrap_or_else(|| Path::new(""));
    validate_paths(&config, root)?;
    Ok(config)
}

/// Parses and validates a `kiln.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies: only the file's own
/// consistency is checked, not the paths it names.
pub fn load_config_from_str(content: &str) -> Result<KilnConfig, ConfigError> {
    let config: KilnConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks configured paths against the project directory `root`.
fn validate_paths(config: &KilnConfig, root: &Path) -> Result<(), ConfigError> {
    if config.cache.backend == BackendKind::Db {
        let path = config.cache.path_in(root);
        if path.is_dir() {
            return Err(ConfigError::ValidationError(format!(
                "cache.path {} is a directory, but the db backend needs a file",
                path.display()
            )));
        }
    }
    Ok(())
}

/// Validates required fields and the consistency of each target entry.
fn validate_config(config: &KilnConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }

    for (i, target) in config.targets.iter().enumerate() {
        if target.name.is_empty() {
            return Err(ConfigError::MissingField(format!("target[{i}].name")));
        }
        if target.command.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "target.{}.command",
                target.name
            )));
        }

        let transforms = [
            target.map.is_some(),
            target.cross.is_some(),
            target.combine.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();
        if transforms > 1 {
            return Err(ConfigError::ValidationError(format!(
                "target '{}' may use only one of map, cross and combine",
                target.name
            )));
        }
        if target.by.is_some() && target.combine.is_none() {
            return Err(ConfigError::ValidationError(format!(
                "target '{}': 'by' requires 'combine'",
                target.name
            )));
        }
        target.transform()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::{Format, HashAlgorithm};
    use kiln_plan::{ParamValues, Transform};
    use std::path::PathBuf;

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
[project]
name = "tuning"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.project.name, "tuning");
        assert!(config.targets.is_empty());
    }

    #[test]
    fn default_values() {
        let config = load_config_from_str("[project]\nname = \"t\"\n").unwrap();
        assert_eq!(config.cache.backend, BackendKind::Dir);
        assert_eq!(config.cache.resolved_path(), PathBuf::from(".kiln"));
        assert_eq!(config.run.workers, 0);
        assert!(config.run.keep_going);
        assert_eq!(config.hash.algorithm, HashAlgorithm::Xxh3);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[project]
name = "keras-tuning"
description = "grid search"

[cache]
backend = "db"
path = "build/cache.db"

[run]
workers = 4
keep_going = false

[hash]
algorithm = "sha256"

[[target]]
name = "data"
command = "cat data.csv"
file_in = ["data.csv"]

[[target]]
name = "model"
command = "fit --units ${units} --act ${act} ${data}"
format = "json"
map = { units = [16, 32], act = ["relu", "tanh"] }

[[target]]
name = "eval"
command = "score ${m}"
map = { m = "model" }

[[target]]
name = "best"
command = "pick ${model}"
combine = "model"
by = "act"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.cache.backend, BackendKind::Db);
        assert_eq!(config.cache.resolved_path(), PathBuf::from("build/cache.db"));
        assert_eq!(config.run.workers, 4);
        assert!(!config.run.keep_going);
        assert_eq!(config.hash.algorithm, HashAlgorithm::Sha256);
        assert_eq!(config.targets.len(), 4);

        let model = config.target("model").unwrap();
        assert_eq!(model.format, Some(Format::Json));
        match model.transform().unwrap() {
            Some(Transform::Map(params)) => {
                let names: Vec<_> = params.iter().map(|p| p.name.as_str()).collect();
                assert_eq!(names, vec!["units", "act"]);
                assert_eq!(
                    params[0].values,
                    ParamValues::Literal(vec!["16".to_string(), "32".to_string()])
                );
            }
            other => panic!("expected map, got {other:?}"),
        }

        match config.target("eval").unwrap().transform().unwrap() {
            Some(Transform::Map(params)) => {
                assert_eq!(params[0].values, ParamValues::Group("model".to_string()));
            }
            other => panic!("expected map, got {other:?}"),
        }

        assert_eq!(
            config.target("best").unwrap().transform().unwrap(),
            Some(Transform::combine_by("model", "act"))
        );
        assert!(matches!(
            config.target("nope"),
            Err(ConfigError::UnknownTarget(_))
        ));
    }

    #[test]
    fn missing_name_errors() {
        let err = load_config_from_str("[project]\nname = \"\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn empty_command_errors() {
        let toml = r#"
[project]
name = "t"

[[target]]
name = "a"
command = "  "
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(ref f) if f == "target.a.command"));
    }

    #[test]
    fn two_transforms_error() {
        let toml = r#"
[project]
name = "t"

[[target]]
name = "a"
command = "x"
map = { n = [1] }
combine = "g"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn by_without_combine_errors() {
        let toml = r#"
[project]
name = "t"

[[target]]
name = "a"
command = "x"
by = "n"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn non_scalar_parameter_errors() {
        let toml = r#"
[project]
name = "t"

[[target]]
name = "a"
command = "x"
cross = { n = [[1, 2]] }
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn db_backend_rejects_directory_path() {
        let dir = tempfile::tempdir().unwrap();
        let toml = format!(
            "[project]\nname = \"t\"\n\n[cache]\nbackend = \"db\"\npath = {:?}\n",
            dir.path().display().to_string()
        );
        std::fs::write(dir.path().join(CONFIG_FILE), toml).unwrap();
        let err = load_config(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn db_path_is_checked_relative_to_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("project");
        std::fs::create_dir_all(project.join("store")).unwrap();
        let toml = "[project]\nname = \"t\"\n\n[cache]\nbackend = \"db\"\npath = \"store\"\n";
        std::fs::write(project.join(CONFIG_FILE), toml).unwrap();

        // `store` is a directory next to kiln.toml, not in the working directory.
        let err = load_config_file(&project.join(CONFIG_FILE)).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(ref m) if m.contains("store")));
        assert!(load_config_from_str(toml).is_ok());

        let toml = "[project]\nname = \"t\"\n\n[cache]\nbackend = \"db\"\npath = \"store/cache.db\"\n";
        std::fs::write(project.join(CONFIG_FILE), toml).unwrap();
        let config = load_config(&project).unwrap();
        assert_eq!(config.cache.path_in(&project), project.join("store/cache.db"));
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_config_from_str("this is not valid toml {{{}}}").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn unknown_backend_is_a_parse_error() {
        let toml = "[project]\nname = \"t\"\n\n[cache]\nbackend = \"rds\"\n";
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn load_from_project_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[project]\nname = \"on-disk\"\n").unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.project.name, "on-disk");
        assert!(matches!(
            load_config(&dir.path().join("missing")),
            Err(ConfigError::IoError(_))
        ));
    }
}
