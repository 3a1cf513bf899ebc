//! Per-target outcomes of a run.

use std::fmt;
use std::time::Duration;

/// Lifecycle state of a target within one run.
///
/// `Stale` and `Running` are transient; a finished run leaves every target
/// in one of `UpToDate`, `Done`, `Failed`, `Blocked` or `Pending` (the last
/// only when the run was aborted or stopped at the first failure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetState {
    /// Not yet examined.
    Pending,
    /// Cached value is current; the command was not run.
    UpToDate,
    /// Needs rebuilding, waiting for a worker.
    Stale,
    /// Command is executing.
    Running,
    /// Built and stored during this run.
    Done,
    /// Command or storage failed.
    Failed,
    /// An upstream target failed.
    Blocked,
}

impl TargetState {
    /// Lowercase display name.
    pub fn name(self) -> &'static str {
        match self {
            TargetState::Pending => "pending",
            TargetState::UpToDate => "up-to-date",
            TargetState::Stale => "stale",
            TargetState::Running => "running",
            TargetState::Done => "done",
            TargetState::Failed => "failed",
            TargetState::Blocked => "blocked",
        }
    }

    /// Whether the state can no longer change within the run.
    pub fn is_final(self) -> bool {
        matches!(
            self,
            TargetState::UpToDate | TargetState::Done | TargetState::Failed | TargetState::Blocked
        )
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReport {
    /// Target name.
    pub name: String,
    /// Final state.
    pub state: TargetState,
    /// Command wall time, for targets whose command ran.
    pub elapsed: Option<Duration>,
    /// Failure message for `Failed` targets.
    pub error: Option<String>,
    /// The failed upstream target that blocked this one.
    pub blocked_by: Option<String>,
}

/// Outcome of a whole run, in plan order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// One entry per expanded target, in plan order.
    pub targets: Vec<TargetReport>,
    /// Set when the run was aborted or stopped early.
    pub aborted: bool,
    /// Wall time of the whole run.
    pub elapsed: Duration,
}

impl RunReport {
    /// Looks up a target's report.
    pub fn get(&self, name: &str) -> Option<&TargetReport> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// A target's final state.
    pub fn state(&self, name: &str) -> Option<TargetState> {
        self.get(name).map(|t| t.state)
    }

    /// Names of targets in `state`, in plan order.
    pub fn in_state(&self, state: TargetState) -> Vec<&str> {
        self.targets
            .iter()
            .filter(|t| t.state == state)
            .map(|t| t.name.as_str())
            .collect()
    }

    /// Targets whose command ran this run, successfully or not.
    pub fn executed(&self) -> Vec<&str> {
        self.targets
            .iter()
            .filter(|t| matches!(t.state, TargetState::Done | TargetState::Failed))
            .map(|t| t.name.as_str())
            .collect()
    }

    /// Targets built and stored this run.
    pub fn built(&self) -> Vec<&str> {
        self.in_state(TargetState::Done)
    }

    /// Targets that failed.
    pub fn failed(&self) -> Vec<&str> {
        self.in_state(TargetState::Failed)
    }

    /// Targets blocked by an upstream failure.
    pub fn blocked(&self) -> Vec<&str> {
        self.in_state(TargetState::Blocked)
    }

    /// Targets whose cached value was reused.
    pub fn up_to_date(&self) -> Vec<&str> {
        self.in_state(TargetState::UpToDate)
    }

    /// Targets never dispatched.
    pub fn pending(&self) -> Vec<&str> {
        self.in_state(TargetState::Pending)
    }

    /// `true` when nothing failed, nothing was blocked and the run finished.
    pub fn success(&self) -> bool {
        !self.aborted
            && self
                .targets
                .iter()
                .all(|t| matches!(t.state, TargetState::UpToDate | TargetState::Done))
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} built, {} up to date, {} failed, {} blocked",
            self.built().len(),
            self.up_to_date().len(),
            self.failed().len(),
            self.blocked().len()
        )?;
        let pending = self.pending().len();
        if pending > 0 {
            write!(f, ", {pending} not started")?;
        }
        write!(f, " in {:.2}s", self.elapsed.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(name: &str, state: TargetState) -> TargetReport {
        TargetReport {
            name: name.to_string(),
            state,
            elapsed: None,
            error: None,
            blocked_by: None,
        }
    }

    #[test]
    fn groups_by_state() {
        let run = RunReport {
            targets: vec![
                report("a", TargetState::UpToDate),
                report("b", TargetState::Done),
                report("c", TargetState::Failed),
                report("d", TargetState::Blocked),
            ],
            aborted: false,
            elapsed: Duration::from_millis(1500),
        };
        assert_eq!(run.executed(), vec!["b", "c"]);
        assert_eq!(run.built(), vec!["b"]);
        assert_eq!(run.blocked(), vec!["d"]);
        assert_eq!(run.state("a"), Some(TargetState::UpToDate));
        assert_eq!(run.state("zzz"), None);
        assert!(!run.success());
        assert_eq!(
            run.to_string(),
            "1 built, 1 up to date, 1 failed, 1 blocked in 1.50s"
        );
    }

    #[test]
    fn aborted_run_is_not_successful() {
        let mut run = RunReport {
            targets: vec![report("a", TargetState::Done), report("b", TargetState::Pending)],
            aborted: true,
            elapsed: Duration::ZERO,
        };
        assert!(!run.success());
        assert!(run.to_string().contains("1 not started"));
        run.aborted = false;
        run.targets.pop();
        assert!(run.success());
    }

    #[test]
    fn final_states() {
        assert!(TargetState::Done.is_final());
        assert!(TargetState::Blocked.is_final());
        assert!(!TargetState::Running.is_final());
        assert_eq!(TargetState::UpToDate.to_string(), "up-to-date");
    }
}
