//! Hierarchical test plans
//!
//! Loads a plan tree from JSON or YAML and linearizes it into the ordered
//! list of invocations a run executes.

mod linearize;
mod node;

pub use linearize::{linearize, InvocationEntry, InvocationList, QualifiedName};
pub use node::{PlanFormat, PlanNode};
