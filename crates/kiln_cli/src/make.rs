//! `kiln make`: build every stale target.

use std::sync::Arc;

use kiln_exec::{Progress, RunReport, TargetState};

use crate::project::Project;
use crate::{GlobalArgs, MakeArgs};

/// Prints a status line as each target starts, finishes or is reused.
struct StatusLines {
    verbose: bool,
    color: bool,
}

impl StatusLines {
    fn line(&self, verb: &str, name: &str) {
        if self.color {
            eprintln!("\x1b[1;32m{verb:>11}\x1b[0m {name}");
        } else {
            eprintln!("{verb:>11} {name}");
        }
    }
}

impl Progress for StatusLines {
    fn state_changed(&self, name: &str, state: TargetState) {
        match state {
            TargetState::Running => self.line("Building", name),
            TargetState::UpToDate if self.verbose => self.line("Fresh", name),
            TargetState::Done if self.verbose => self.line("Built", name),
            _ => {}
        }
    }
}

/// Runs the `kiln make` command.
///
/// Returns exit code 0 when every target is built or up to date, 1 when any
/// target failed or was blocked.
pub fn run(args: &MakeArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = Project::load(global)?;
    let plan = project.plan()?;
    let cache = project.cache()?;

    let mut scheduler = project.scheduler(cache);
    if let Some(jobs) = args.jobs {
        scheduler = scheduler.workers(jobs);
    }
    if args.fail_fast {
        scheduler = scheduler.keep_going(false);
    }
    if !global.quiet {
        scheduler = scheduler.progress(Arc::new(StatusLines {
            verbose: global.verbose,
            color: global.color,
        }));
    }

    global.status("Planning", &project.config.project.name);
    let report = scheduler.run(&plan)?;
    print_report(&report, global);
    Ok(if report.success() { 0 } else { 1 })
}

fn print_report(report: &RunReport, global: &GlobalArgs) {
    for target in &report.targets {
        match target.state {
            TargetState::Failed => global.error(format!(
                "{}: {}",
                target.name,
                target.error.as_deref().unwrap_or("failed")
            )),
            TargetState::Blocked => global.status(
                "Blocked",
                format!(
                    "{} (by {})",
                    target.name,
                    target.blocked_by.as_deref().unwrap_or("an upstream failure")
                ),
            ),
            _ => {}
        }
    }
    if report.aborted {
        global.status("Stopped", "remaining targets were not started");
    }
    global.status("Finished", report);
}
