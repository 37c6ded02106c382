//! Stategraph: build a directed graph of named nodes over a shared state,
//! compile it once, then invoke it any number of times.
//!
//! This crate re-exports the Stategraph sub-crates for single-import usage.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `default` | `graph` |
//! | `graph` | `StateGraph` builder, `CompiledGraph`, step-bounded executor, visualization |
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use stategraph::core::StateMap;
//! use stategraph::graph::{StateGraph, END};
//!
//! let graph = StateGraph::<StateMap>::new()
//!     .add_fn_node("greeter", |s: &StateMap| {
//!         let name = s.require_str("name")?;
//!         Ok(StateMap::from([("message", format!("Hello, {name}!"))]))
//!     })?
//!     .set_entry_point("greeter")?
//!     .add_edge("greeter", END)?
//!     .compile()?;
//!
//! let result = graph.invoke(StateMap::from([("name", "Alice")]))?;
//! ```

/// State values, `StateMap`, `Schema`, `ExecutionTrace` and `GraphError`.
/// Always available.
pub use stategraph_core as core;

/// Graph builder, compiled graph, executor and visualization.
#[cfg(feature = "graph")]
pub use stategraph_graph as graph;

/// The types most programs need, in one import.
pub mod prelude {
    pub use stategraph_core::{
        ExecutionTrace, FieldError, GraphError, NodeError, Schema, StateMap, Value, ValueKind,
    };

    #[cfg(feature = "graph")]
    pub use stategraph_graph::{
        CompiledGraph, ExecutionConfig, Node, State, StateGraph, Target, END, START,
    };
}
