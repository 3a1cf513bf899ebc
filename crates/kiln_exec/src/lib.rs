//! Incremental execution of kiln plans.
//!
//! The [`Scheduler`] expands a plan, builds its dependency graph and runs
//! every stale target on a worker pool, reusing cached values for the rest.
//! A target is stale when it has no cache entry, its entry is unreadable,
//! its fingerprint changed, one of its declared output files was removed or
//! modified, or an upstream target was rebuilt in the same run.
//!
//! ```no_run
//! use kiln_cache::Cache;
//! use kiln_common::Value;
//! use kiln_plan::{Plan, Target};
//!
//! let plan = Plan::new()
//!     .with(Target::new("data", "load", |_| Ok(Value::text("1,2,3"))))
//!     .with(Target::new("total", "sum ${data}", |inputs| {
//!         let data = inputs.get("data")?.as_text().unwrap_or_default();
//!         Ok(Value::text(data.split(',').count().to_string()))
//!     }));
//! let report = kiln_exec::run(&plan, &Cache::in_memory(), 2).unwrap();
//! assert!(report.success());
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod fingerprint;
pub mod progress;
pub mod report;
pub mod scheduler;

pub use error::RunError;
pub use fingerprint::FingerprintEngine;
pub use progress::{NoProgress, Progress};
pub use report::{RunReport, TargetReport, TargetState};
pub use scheduler::{AbortHandle, Outdated, Scheduler, StaleReason};

use kiln_cache::Cache;
use kiln_plan::Plan;

/// Runs `plan` against `cache` with up to `workers` concurrent commands
/// (`0` for the available parallelism) and default settings otherwise.
pub fn run(plan: &Plan, cache: &Cache, workers: usize) -> Result<RunReport, RunError> {
    Scheduler::new(cache.clone()).workers(workers).run(plan)
}

/// Lists the targets a [`run`] would rebuild, without executing anything.
pub fn outdated(plan: &Plan, cache: &Cache) -> Result<Vec<Outdated>, RunError> {
    Scheduler::new(cache.clone()).outdated(plan)
}
