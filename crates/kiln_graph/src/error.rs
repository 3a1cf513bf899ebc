//! Graph construction errors.

use kiln_plan::{MissingDependencyError, PlanError};

/// Why a dependency graph could not be built. Both kinds are fatal and occur
/// before anything executes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// The plan is malformed (duplicate outputs, cycles, ...).
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// A target depends on something that does not exist.
    #[error(transparent)]
    MissingDependency(#[from] MissingDependencyError),
}
