//! Cache inspection: `kiln show`, `kiln cached`, `kiln times`, `kiln clean`.

use std::io::Write;

use kiln_cache::{BuildTime, Cache};
use kiln_common::{Format, Value};

use crate::project::Project;
use crate::shell::value_text;
use crate::GlobalArgs;

/// Runs `kiln show <target>`: writes the cached value to stdout.
pub fn show(target: &str, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = Project::load(global)?;
    let cache = project.cache()?;
    let Some(entry) = cache.entry(target)? else {
        global.error(format!("no cached value for '{target}'"));
        return Ok(1);
    };
    if global.verbose {
        global.status("Fingerprint", entry.fingerprint);
        global.status(
            "Built",
            format!(
                "in {:.3}s ({} bytes, {})",
                entry.meta.elapsed.as_secs_f64(),
                entry.value.len(),
                entry.value.format()
            ),
        );
    }
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&render(&entry.value)?)?;
    stdout.flush()?;
    Ok(0)
}

/// Bytes `kiln show` prints for a value: raw payloads verbatim, JSON
/// pretty-printed, bincode strings decoded.
fn render(value: &Value) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    Ok(match value.format() {
        Format::Raw => value.as_bytes().to_vec(),
        Format::Json => {
            let json: serde_json::Value = value.decode()?;
            let mut out = serde_json::to_vec_pretty(&json)?;
            out.push(b'\n');
            out
        }
        Format::Bincode => {
            let mut text = value_text(value);
            text.push('\n');
            text.into_bytes()
        }
    })
}

/// Runs `kiln cached`: lists cached keys, one per line.
pub fn cached(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = Project::load(global)?;
    for key in project.cache()?.list_keys()? {
        println!("{key}");
    }
    Ok(0)
}

/// Runs `kiln times`: prints recorded build durations.
pub fn times(slowest: bool, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = Project::load(global)?;
    let mut times = project.cache()?.build_times()?;
    if slowest {
        times.sort_by(|a, b| b.elapsed.cmp(&a.elapsed).then_with(|| a.name.cmp(&b.name)));
    }
    for line in format_times(&times) {
        println!("{line}");
    }
    Ok(0)
}

fn format_times(times: &[BuildTime]) -> Vec<String> {
    let width = times.iter().map(|t| t.name.len()).max().unwrap_or(0);
    times
        .iter()
        .map(|t| format!("{:<width$}  {:>10.3}s", t.name, t.elapsed.as_secs_f64()))
        .collect()
}

/// Runs `kiln clean [targets...]`.
///
/// Without arguments the whole cache is destroyed. A group name (a template
/// that expanded into several targets) removes every member.
pub fn clean(targets: &[String], global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = Project::load(global)?;
    let cache = project.cache()?;
    if targets.is_empty() {
        cache.destroy()?;
        global.status(
            "Removed",
            format!("cache at {}", project.config.cache.resolved_path().display()),
        );
        return Ok(0);
    }

    let expanded = project.plan()?.expand()?;
    let mut keys = Vec::new();
    for name in targets {
        match expanded.group(name) {
            Some(members) => keys.extend(members.iter().cloned()),
            None => keys.push(name.clone()),
        }
    }
    remove_keys(&cache, &keys, global)
}

fn remove_keys(
    cache: &Cache,
    keys: &[String],
    global: &GlobalArgs,
) -> Result<i32, Box<dyn std::error::Error>> {
    for key in keys {
        if cache.remove(key)? {
            global.status("Removed", key);
        } else {
            global.status("Skipped", format!("{key} (not cached)"));
        }
    }
    Ok(0)
}
