//! Run observers.

use crate::report::{RunReport, TargetState};

/// Receives state transitions as the scheduler makes them.
///
/// Called from the coordinating thread only, in the order transitions
/// happen. Implementations should return quickly.
pub trait Progress: Send + Sync {
    /// `name` moved to `state`.
    fn state_changed(&self, name: &str, state: TargetState);

    /// The run finished.
    fn finished(&self, _report: &RunReport) {}
}

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn state_changed(&self, _name: &str, _state: TargetState) {}
}
