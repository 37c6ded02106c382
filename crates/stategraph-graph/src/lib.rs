mod builder;
mod compiled;
mod edge;
mod execution;
mod node;
mod state;
mod visualization;

pub use builder::StateGraph;
pub use compiled::CompiledGraph;
pub use edge::{ConditionalEdge, Edge, RouterFn, Target};
pub use execution::{Execution, ExecutionConfig, ExecutionStatus, GraphEvent, DEFAULT_MAX_STEPS};
pub use node::{FnNode, Node};
pub use state::{State, StateSchema};

/// Sentinel name for the graph start point.
pub const START: &str = "__start__";
/// Sentinel name for the graph end point.
pub const END: &str = "__end__";
