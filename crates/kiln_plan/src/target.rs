//! Targets: named, cacheable units of computation.

use crate::command::{BuildError, Command, Inputs};
use crate::transform::Transform;
use kiln_common::{Format, Value};
use std::path::PathBuf;

/// Grouping metadata attached during expansion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupMeta {
    /// Template this target was expanded from.
    pub template: Option<String>,
    /// Parameter bindings, in declaration order (inherited bindings first).
    pub params: Vec<(String, String)>,
    /// Combined members, in enumeration order.
    pub members: Vec<String>,
}

impl GroupMeta {
    /// Returns the value bound to `name`, if any.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A named unit of computation.
#[derive(Clone, Debug)]
pub struct Target {
    pub(crate) name: String,
    pub(crate) command: Command,
    pub(crate) file_inputs: Vec<PathBuf>,
    pub(crate) file_outputs: Vec<PathBuf>,
    pub(crate) deps: Vec<String>,
    pub(crate) format: Format,
    pub(crate) meta: GroupMeta,
    pub(crate) transform: Option<Transform>,
}

impl Target {
    /// Creates a target from a name, command text and closure.
    pub fn new<F>(name: impl Into<String>, text: impl Into<String>, run: F) -> Self
    where
        F: Fn(&Inputs) -> Result<Value, BuildError> + Send + Sync + 'static,
    {
        Self::with_command(name, Command::new(text, run))
    }

    /// Creates a target around an existing command.
    pub fn with_command(name: impl Into<String>, command: Command) -> Self {
        Self {
            name: name.into(),
            command,
            file_inputs: Vec::new(),
            file_outputs: Vec::new(),
            deps: Vec::new(),
            format: Format::default(),
            meta: GroupMeta::default(),
            transform: None,
        }
    }

    /// Declares an input file.
    pub fn file_in(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_inputs.push(path.into());
        self
    }

    /// Declares an output file.
    pub fn file_out(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_outputs.push(path.into());
        self
    }

    /// Adds an explicit dependency on another target.
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.deps.contains(&name) {
            self.deps.push(name);
        }
        self
    }

    /// Sets the storage format hint.
    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Turns this target into a template expanded by `transform`.
    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Target name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The command.
    pub fn command(&self) -> &Command {
        &self.command
    }

    /// Command text.
    pub fn text(&self) -> &str {
        self.command.text()
    }

    /// Declared input files.
    pub fn file_inputs(&self) -> &[PathBuf] {
        &self.file_inputs
    }

    /// Declared output files.
    pub fn file_outputs(&self) -> &[PathBuf] {
        &self.file_outputs
    }

    /// Explicit dependencies.
    pub fn deps(&self) -> &[String] {
        &self.deps
    }

    /// Storage format hint.
    pub fn storage_format(&self) -> Format {
        self.format
    }

    /// Grouping metadata.
    pub fn meta(&self) -> &GroupMeta {
        &self.meta
    }

    /// The transform, if this is an unexpanded template.
    pub fn template_transform(&self) -> Option<&Transform> {
        self.transform.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_declarations() {
        let t = Target::new("fit", "fit ${data}", |_| Ok(Value::text("ok")))
            .file_in("data.csv")
            .file_out("model.bin")
            .depends_on("data")
            .depends_on("data")
            .format(Format::Json);
        assert_eq!(t.name(), "fit");
        assert_eq!(t.text(), "fit ${data}");
        assert_eq!(t.file_inputs(), &[PathBuf::from("data.csv")]);
        assert_eq!(t.file_outputs(), &[PathBuf::from("model.bin")]);
        assert_eq!(t.deps(), &["data".to_string()]);
        assert_eq!(t.storage_format(), Format::Json);
        assert!(t.template_transform().is_none());
    }

    #[test]
    fn meta_param_lookup() {
        let meta = GroupMeta {
            template: Some("model".to_string()),
            params: vec![("units".to_string(), "16".to_string())],
            members: Vec::new(),
        };
        assert_eq!(meta.param("units"), Some("16"));
        assert_eq!(meta.param("act"), None);
    }
}
