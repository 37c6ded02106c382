use std::collections::HashMap;

use stategraph_core::{ExecutionTrace, GraphError};

use crate::edge::{Target, Transition};
use crate::execution::{Execution, ExecutionConfig};
use crate::node::Node;
use crate::state::{State, StateSchema};

/// The compiled, executable graph.
///
/// Immutable after [`StateGraph::compile`](crate::StateGraph::compile); every
/// invocation borrows it read-only, so one instance can be shared across
/// threads (for example behind an `Arc`) and invoked concurrently.
pub struct CompiledGraph<S: State> {
    pub(crate) nodes: HashMap<String, Box<dyn Node<S>>>,
    pub(crate) transitions: HashMap<String, Transition<S>>,
    pub(crate) entry_point: String,
    pub(crate) schema: Option<Box<dyn StateSchema<S>>>,
    pub(crate) config: ExecutionConfig,
}

impl<S: State> std::fmt::Debug for CompiledGraph<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("entry_point", &self.entry_point)
            .field("node_count", &self.nodes.len())
            .field("edge_count", &self.transitions.len())
            .field("has_schema", &self.schema.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl<S: State> CompiledGraph<S> {
    /// Execute the graph with initial state.
    pub fn invoke(&self, state: S) -> Result<S, GraphError> {
        self.invoke_with_config(state, self.config.clone())
    }

    /// Execute with limits that override the compiled defaults.
    pub fn invoke_with_config(&self, state: S, config: ExecutionConfig) -> Result<S, GraphError> {
        self.execute_with_config(state, config)?
            .run()
            .map(|(state, _)| state)
    }

    /// Execute and also return the ordered list of visited nodes.
    pub fn invoke_with_trace(&self, state: S) -> Result<(S, ExecutionTrace), GraphError> {
        self.execute(state)?.run()
    }

    /// Start a step-by-step execution using the compiled defaults.
    ///
    /// Fails immediately if the initial state violates the graph's schema.
    pub fn execute(&self, state: S) -> Result<Execution<'_, S>, GraphError> {
        self.execute_with_config(state, self.config.clone())
    }

    pub fn execute_with_config(
        &self,
        state: S,
        config: ExecutionConfig,
    ) -> Result<Execution<'_, S>, GraphError> {
        if let Some(schema) = &self.schema {
            schema.validate(&state).map_err(GraphError::InvalidInput)?;
        }
        Ok(Execution::new(self, state, config))
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Default execution limits.
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn has_node(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// All node names, sorted.
    pub fn node_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        names.sort();
        names
    }

    /// Statically known successors of `name`, sorted. A node without an
    /// outgoing edge reports the terminal marker; an unknown name reports none.
    pub fn successors(&self, name: &str) -> Vec<Target> {
        if !self.has_node(name) {
            return Vec::new();
        }
        let mut targets: Vec<Target> = match self.transitions.get(name) {
            Some(transition) => transition.targets().into_iter().cloned().collect(),
            None => vec![Target::End],
        };
        targets.sort();
        targets.dedup();
        targets
    }
}
