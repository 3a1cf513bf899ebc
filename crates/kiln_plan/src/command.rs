//! The command capability and its invocation contract.
//!
//! A [`Command`] pairs the text the engine scans and fingerprints with an
//! opaque closure that turns resolved [`Inputs`] into a [`Value`]. The engine
//! never interprets what the closure does.

use kiln_common::{Value, ValueError};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Signature of a target's computation.
pub type CommandFn = dyn Fn(&Inputs) -> Result<Value, BuildError> + Send + Sync;

/// A per-target failure. Non-fatal to the run.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The command reported a failure.
    #[error("{0}")]
    Failed(String),

    /// The command asked for an upstream value it does not depend on.
    #[error("no input named '{0}'")]
    MissingInput(String),

    /// The command asked for a parameter its target does not bind.
    #[error("no parameter named '{0}'")]
    MissingParam(String),

    /// A parameter could not be parsed into the requested type.
    #[error("parameter '{name}' = '{value}' is invalid: {reason}")]
    InvalidParam {
        /// Parameter name.
        name: String,
        /// Bound value.
        value: String,
        /// Parse failure.
        reason: String,
    },

    /// An upstream value could not be decoded, or the result encoded.
    #[error(transparent)]
    Value(#[from] ValueError),

    /// A declared input file could not be read for fingerprinting.
    #[error("cannot read input file {path}: {source}")]
    InputFile {
        /// The unreadable path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A declared output file does not exist after the command returned.
    #[error("declared output file {0} was not produced")]
    MissingOutput(PathBuf),

    /// The command panicked.
    #[error("command panicked: {0}")]
    Panicked(String),

    /// The cached value of an up-to-date upstream target could not be loaded.
    #[error("cannot load upstream value '{name}': {reason}")]
    Upstream {
        /// Upstream target name.
        name: String,
        /// Description of the failure.
        reason: String,
    },

    /// Writing the result to the cache failed.
    #[error("cache write failed: {0}")]
    Storage(String),

    /// An I/O error raised by the command itself.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// Creates a [`BuildError::Failed`] with the given message.
    pub fn msg(message: impl Into<String>) -> Self {
        BuildError::Failed(message.into())
    }
}

/// A target's computation: scannable text plus an opaque closure.
#[derive(Clone)]
pub struct Command {
    text: String,
    run: Arc<CommandFn>,
}

impl Command {
    /// Creates a command from its text and closure.
    pub fn new<F>(text: impl Into<String>, run: F) -> Self
    where
        F: Fn(&Inputs) -> Result<Value, BuildError> + Send + Sync + 'static,
    {
        Self {
            text: text.into(),
            run: Arc::new(run),
        }
    }

    /// Creates a command sharing an already boxed closure.
    pub fn from_arc(text: impl Into<String>, run: Arc<CommandFn>) -> Self {
        Self {
            text: text.into(),
            run,
        }
    }

    /// Returns the command text used for scanning and fingerprinting.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns a copy of this command with different text and the same closure.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            run: Arc::clone(&self.run),
        }
    }

    /// Invokes the closure.
    pub fn invoke(&self, inputs: &Inputs) -> Result<Value, BuildError> {
        (self.run)(inputs)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command").field("text", &self.text).finish()
    }
}

/// Everything a command may read: upstream values, parameter bindings,
/// the expanded command text and, for combined targets, the ordered member
/// names.
#[derive(Clone, Debug, Default)]
pub struct Inputs {
    target: String,
    text: String,
    values: BTreeMap<String, Arc<Value>>,
    params: Vec<(String, String)>,
    members: Vec<String>,
}

impl Inputs {
    /// Creates empty inputs for the named target.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    /// Adds an upstream value.
    pub fn with_value(mut self, name: impl Into<String>, value: Arc<Value>) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Sets the parameter bindings.
    pub fn with_params(mut self, params: Vec<(String, String)>) -> Self {
        self.params = params;
        self
    }

    /// Sets the command text as expanded for this target.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Sets the ordered member names of a combined target.
    pub fn with_members(mut self, members: Vec<String>) -> Self {
        self.members = members;
        self
    }

    /// Name of the target being built.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The target's command text, with transform parameters substituted.
    ///
    /// Expanded targets share their template's closure, so a closure that
    /// interprets its text must read it from here.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the upstream value named `name`.
    pub fn get(&self, name: &str) -> Result<&Value, BuildError> {
        self.values
            .get(name)
            .map(|v| v.as_ref())
            .ok_or_else(|| BuildError::MissingInput(name.to_string()))
    }

    /// Decodes the upstream value named `name`.
    pub fn decode<T: DeserializeOwned>(&self, name: &str) -> Result<T, BuildError> {
        Ok(self.get(name)?.decode()?)
    }

    /// Iterates all upstream values, ordered by name.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// Returns the value bound to parameter `name`.
    pub fn param(&self, name: &str) -> Result<&str, BuildError> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .ok_or_else(|| BuildError::MissingParam(name.to_string()))
    }

    /// Parses the value bound to parameter `name`.
    pub fn param_as<T>(&self, name: &str) -> Result<T, BuildError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let raw = self.param(name)?;
        raw.parse::<T>().map_err(|e| BuildError::InvalidParam {
            name: name.to_string(),
            value: raw.to_string(),
            reason: e.to_string(),
        })
    }

    /// Returns all parameter bindings in declaration order.
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Iterates combined members and their values in enumeration order.
    pub fn members(&self) -> impl Iterator<Item = Result<(&str, &Value), BuildError>> {
        self.members
            .iter()
            .map(|m| self.get(m).map(|v| (m.as_str(), v)))
    }

    /// Returns the ordered member names.
    pub fn member_names(&self) -> &[String] {
        &self.members
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::Format;

    fn inputs() -> Inputs {
        Inputs::new("combined")
            .with_value("model_32", Arc::new(Value::text("b")))
            .with_value("model_16", Arc::new(Value::text("a")))
            .with_params(vec![("units".to_string(), "16".to_string())])
            .with_members(vec!["model_32".to_string(), "model_16".to_string()])
    }

    #[test]
    fn get_and_missing() {
        let i = inputs();
        assert_eq!(i.get("model_16").unwrap().as_text(), Some("a"));
        assert!(matches!(i.get("nope"), Err(BuildError::MissingInput(n)) if n == "nope"));
    }

    #[test]
    fn members_keep_declared_order() {
        let i = inputs();
        let names: Vec<_> = i.members().map(|m| m.unwrap().0).collect();
        assert_eq!(names, vec!["model_32", "model_16"]);
    }

    #[test]
    fn params_parse() {
        let i = inputs();
        assert_eq!(i.param("units").unwrap(), "16");
        assert_eq!(i.param_as::<u32>("units").unwrap(), 16);
        assert!(matches!(i.param("act"), Err(BuildError::MissingParam(_))));
        let bad = Inputs::new("t").with_params(vec![("n".to_string(), "x".to_string())]);
        assert!(matches!(bad.param_as::<u32>("n"), Err(BuildError::InvalidParam { .. })));
    }

    #[test]
    fn command_invokes_closure() {
        let cmd = Command::new("double ${x}", |inputs: &Inputs| {
            let x: u64 = inputs.decode("x")?;
            Ok(Value::encode(&(x * 2), Format::Bincode)?)
        });
        let x = Value::encode(&21u64, Format::Bincode).unwrap();
        let out = cmd
            .invoke(&Inputs::new("y").with_value("x", Arc::new(x)))
            .unwrap();
        assert_eq!(out.decode::<u64>().unwrap(), 42);
        assert_eq!(cmd.with_text("other").text(), "other");
    }

    #[test]
    fn expanded_text_reaches_the_closure() {
        let cmd = Command::new("fit ${units}", |inputs: &Inputs| {
            Ok(Value::text(inputs.text()))
        });
        let expanded = cmd.with_text("fit 16");
        let out = expanded
            .invoke(&Inputs::new("fit_16").with_text(expanded.text()))
            .unwrap();
        assert_eq!(out.as_text(), Some("fit 16"));
    }
}
