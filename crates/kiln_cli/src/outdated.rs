//! `kiln outdated`: list what the next build would run.

use crate::project::Project;
use crate::GlobalArgs;

/// Runs the `kiln outdated` command.
///
/// Prints one stale target per line on stdout, with the reason when
/// verbose. Always exits 0.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = Project::load(global)?;
    let plan = project.plan()?;
    let outdated = project.scheduler(project.cache()?).outdated(&plan)?;

    if outdated.is_empty() {
        global.status("Fresh", "all targets are up to date");
        return Ok(0);
    }
    for target in &outdated {
        if global.verbose {
            println!("{}: {}", target.name, target.reason);
        } else {
            println!("{}", target.name);
        }
    }
    Ok(0)
}
