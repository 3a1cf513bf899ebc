//! Shell-backed commands for targets declared in `kiln.toml`.
//!
//! A target's command runs under `/bin/sh -c` in the project root. Every
//! `${name}` is a target reference and is replaced by that target's value as
//! text (trailing newlines trimmed, as shell command substitution does). A
//! braced name that is not a target fails graph construction, so shell
//! variables are written unbraced (`$HOME`, `$KILN_TARGET`). Standard output
//! becomes the target's value; standard error passes through to the terminal.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use kiln_common::{Format, Value};
use kiln_plan::placeholder::substitute;
use kiln_plan::{BuildError, Command, Inputs};

/// Builds a [`Command`] that runs `text` through the shell.
pub fn shell_command(text: &str, root: &Path, format: Format) -> Command {
    let root: PathBuf = root.to_path_buf();
    Command::new(text, move |inputs: &Inputs| run(inputs, &root, format))
}

/// The script actually handed to the shell.
pub fn interpolate(inputs: &Inputs) -> String {
    substitute(inputs.text(), |name| inputs.get(name).ok().map(value_text))
}

/// A value rendered as text for interpolation and display.
pub fn value_text(value: &Value) -> String {
    let text = match value.format() {
        Format::Bincode => value
            .decode::<String>()
            .unwrap_or_else(|_| String::from_utf8_lossy(value.as_bytes()).into_owned()),
        Format::Json | Format::Raw => String::from_utf8_lossy(value.as_bytes()).into_owned(),
    };
    text.trim_end_matches(['\n', '\r']).to_string()
}

fn run(inputs: &Inputs, root: &Path, format: Format) -> Result<Value, BuildError> {
    let script = interpolate(inputs);
    tracing::debug!(name = inputs.target(), %script, "running shell command");

    let output = std::process::Command::new("/bin/sh")
        .arg("-c")
        .arg(&script)
        .current_dir(root)
        .env("KILN_TARGET", inputs.target())
        .envs(
            inputs
                .params()
                .iter()
                .map(|(name, value)| (format!("KILN_PARAM_{name}"), value)),
        )
        .stdin(Stdio::null())
        .stderr(Stdio::inherit())
        .output()?;

    if !output.status.success() {
        return Err(BuildError::Failed(match output.status.code() {
            Some(code) => format!("command exited with status {code}"),
            None => "command terminated by a signal".to_string(),
        }));
    }
    to_value(output.stdout, format)
}

fn to_value(stdout: Vec<u8>, format: Format) -> Result<Value, BuildError> {
    match format {
        Format::Raw => Ok(Value::raw(stdout)),
        Format::Json => {
            let json: serde_json::Value = serde_json::from_slice(&stdout)
                .map_err(|e| BuildError::msg(format!("stdout is not valid JSON: {e}")))?;
            Ok(Value::encode(&json, Format::Json)?)
        }
        Format::Bincode => {
            let text = String::from_utf8_lossy(&stdout).into_owned();
            Ok(Value::encode(&text, Format::Bincode)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn invoke(text: &str, format: Format, inputs: Inputs) -> Result<Value, BuildError> {
        let dir = tempfile::tempdir().unwrap();
        shell_command(text, dir.path(), format).invoke(&inputs.with_text(text))
    }

    #[test]
    fn stdout_becomes_the_value() {
        let value = invoke("echo hello", Format::Raw, Inputs::new("t")).unwrap();
        assert_eq!(value, Value::text("hello\n"));
    }

    #[test]
    fn upstream_values_are_interpolated() {
        let inputs = Inputs::new("t")
            .with_value("rec", Arc::new(Value::text("rows.csv\n")))
            .with_value("units", Arc::new(Value::encode("16", Format::Bincode).unwrap()));
        let text = "echo ${rec} ${units} $HOME_DIR";
        assert_eq!(
            interpolate(&inputs.clone().with_text(text)),
            "echo rows.csv 16 $HOME_DIR"
        );
        let value = invoke("echo ${rec}-${units}", Format::Raw, inputs).unwrap();
        assert_eq!(value.as_text(), Some("rows.csv-16\n"));
    }

    #[test]
    fn runs_in_the_project_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.csv"), "1,2\n").unwrap();
        let value = shell_command("cat data.csv", dir.path(), Format::Raw)
            .invoke(&Inputs::new("data").with_text("cat data.csv"))
            .unwrap();
        assert_eq!(value.as_text(), Some("1,2\n"));
    }

    #[test]
    fn parameters_are_exported() {
        let inputs = Inputs::new("model_16").with_params(vec![("units".into(), "16".into())]);
        let value = invoke("printf '%s %s' $KILN_TARGET $KILN_PARAM_units", Format::Raw, inputs)
            .unwrap();
        assert_eq!(value.as_text(), Some("model_16 16"));
    }

    #[test]
    fn non_zero_exit_fails() {
        let err = invoke("exit 3", Format::Raw, Inputs::new("t")).unwrap_err();
        assert_eq!(err.to_string(), "command exited with status 3");
    }

    #[test]
    fn json_format_validates_stdout() {
        let value = invoke(r#"echo '{"acc": 0.9}'"#, Format::Json, Inputs::new("t")).unwrap();
        let parsed: serde_json::Value = value.decode().unwrap();
        assert_eq!(parsed["acc"], 0.9);

        let err = invoke("echo not-json", Format::Json, Inputs::new("t")).unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn bincode_values_render_as_text() {
        let value = invoke("echo 42", Format::Bincode, Inputs::new("t")).unwrap();
        assert_eq!(value_text(&value), "42");
    }
}
