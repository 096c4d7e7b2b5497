//! Workflow graph and validation
//!
//! - `graph`: control-flow edges between tasks, BFS reachability
//! - `validate`: entry, target, reachability and termination checks

mod graph;
mod validate;

pub use graph::{Edge, EdgeVec, WorkflowGraph};
pub use validate::{validate, Validator};
