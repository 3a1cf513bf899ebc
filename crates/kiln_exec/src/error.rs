//! Errors that prevent a run from starting.
//!
//! Failures of individual targets never surface here; they are recorded in
//! the [`RunReport`](crate::RunReport).

use kiln_graph::GraphError;
use kiln_plan::{MissingDependencyError, PlanError};

/// A run could not be started.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The plan is invalid (duplicate names, bad transforms, cycles).
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// A target refers to something that does not exist.
    #[error(transparent)]
    MissingDependency(#[from] MissingDependencyError),

    /// The worker pool could not be created.
    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl From<GraphError> for RunError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::Plan(e) => RunError::Plan(e),
            GraphError::MissingDependency(e) => RunError::MissingDependency(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_errors_keep_their_message() {
        let err = RunError::from(GraphError::Plan(PlanError::Cycle {
            targets: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        }));
        assert!(matches!(err, RunError::Plan(PlanError::Cycle { .. })));
        assert!(err.to_string().contains("a -> b -> a"));
    }
}
