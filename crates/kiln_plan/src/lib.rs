//! Declarative pipeline plans.
//!
//! A [`Plan`] is an ordered list of [`Target`]s, some of which are templates
//! carrying a [`Transform`]. [`Plan::expand`] compiles the plan into a flat
//! [`ExpandedPlan`] with one concrete target per parameter combination, before
//! any graph is built or any command runs.

#![warn(missing_docs)]

pub mod command;
pub mod error;
pub mod expand;
pub mod placeholder;
pub mod target;
pub mod transform;

pub use command::{BuildError, Command, CommandFn, Inputs};
pub use error::{MissingDependencyError, PlanError};
pub use expand::{ExpandedPlan, Plan};
pub use target::{GroupMeta, Target};
pub use transform::{Param, ParamValues, Transform};
