//! Fatal, pre-execution errors.
//!
//! Both error kinds abort a run before any target executes.

use std::path::PathBuf;

/// The plan itself is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// Two targets share a name after expansion.
    #[error("duplicate target name '{0}'")]
    DuplicateTarget(String),

    /// A target name is not identifier-like.
    #[error("invalid target name '{0}' (use letters, digits, '_' or '.', not starting with a digit)")]
    InvalidName(String),

    /// A transform has no parameters at all.
    #[error("transform on '{template}' has no parameters")]
    NoParameters {
        /// Template target name.
        template: String,
    },

    /// A parameter list of a transform is empty.
    #[error("parameter '{param}' of '{template}' has no values")]
    EmptyParameter {
        /// Template target name.
        template: String,
        /// Parameter name.
        param: String,
    },

    /// Co-varying parameter lists of a `map` have different lengths.
    #[error("parameters of '{template}' have mismatched lengths: {}", format_lengths(.lengths))]
    MismatchedLengths {
        /// Template target name.
        template: String,
        /// Each parameter name with its number of values.
        lengths: Vec<(String, usize)>,
    },

    /// A transform refers to a group no earlier template produced.
    #[error("'{template}' refers to unknown group '{group}'")]
    UnknownGroup {
        /// Template target name.
        template: String,
        /// The missing group name.
        group: String,
    },

    /// `combine ... by` names a parameter some group member does not bind.
    #[error("'{template}' groups '{group}' by '{param}', but member '{member}' has no such parameter")]
    UnknownByParam {
        /// Template target name.
        template: String,
        /// Combined group name.
        group: String,
        /// The `by` parameter.
        param: String,
        /// First member lacking the parameter.
        member: String,
    },

    /// Two targets declare the same output file.
    #[error("file {path} is declared as output of both '{first}' and '{second}'")]
    DuplicateOutput {
        /// The contested path.
        path: PathBuf,
        /// First declaring target.
        first: String,
        /// Second declaring target.
        second: String,
    },

    /// The dependency graph contains a cycle.
    #[error("dependency cycle between targets: {}", .targets.join(" -> "))]
    Cycle {
        /// Targets participating in the cycle.
        targets: Vec<String>,
    },
}

fn format_lengths(lengths: &[(String, usize)]) -> String {
    lengths
        .iter()
        .map(|(name, len)| format!("{name}={len}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A target depends on something that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MissingDependencyError {
    /// A required reference or explicit dependency names no target.
    #[error("target '{target}' depends on undefined target '{reference}'")]
    UnknownTarget {
        /// The referencing target.
        target: String,
        /// The undefined name.
        reference: String,
    },

    /// A declared input file neither exists nor is produced by any target.
    #[error("target '{target}' reads {path}, which does not exist and no target produces")]
    MissingFile {
        /// The reading target.
        target: String,
        /// The missing path.
        path: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_duplicate() {
        let err = PlanError::DuplicateTarget("model_16".to_string());
        assert_eq!(err.to_string(), "duplicate target name 'model_16'");
    }

    #[test]
    fn display_mismatched_lengths() {
        let err = PlanError::MismatchedLengths {
            template: "model".to_string(),
            lengths: vec![("units".to_string(), 2), ("act".to_string(), 3)],
        };
        assert_eq!(
            err.to_string(),
            "parameters of 'model' have mismatched lengths: units=2, act=3"
        );
    }

    #[test]
    fn display_cycle() {
        let err = PlanError::Cycle {
            targets: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        };
        assert_eq!(err.to_string(), "dependency cycle between targets: a -> b -> a");
    }

    #[test]
    fn display_missing_file() {
        let err = MissingDependencyError::MissingFile {
            target: "data".to_string(),
            path: PathBuf::from("raw.csv"),
        };
        let msg = err.to_string();
        assert!(msg.contains("data"));
        assert!(msg.contains("raw.csv"));
    }
}
