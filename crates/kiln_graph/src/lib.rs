//! Dependency graph construction for kiln plans.
//!
//! [`DependencyGraph::build`] scans every target of an expanded plan for
//! references to other targets and for file declarations, links file
//! producers to consumers, rejects cycles, and fixes a deterministic
//! topological order that the scheduler and reporting tools share.

#![warn(missing_docs)]

pub mod error;
pub mod graph;
pub mod scan;

pub use error::GraphError;
pub use graph::{DependencyGraph, Edge, EdgeKind, Node, TargetId};
pub use scan::{scan, Scan};
