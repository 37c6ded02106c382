use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use stategraph_core::{GraphError, NodeError, NodeRole};

use crate::compiled::CompiledGraph;
use crate::edge::{ConditionalEdge, Edge, Target, Transition};
use crate::execution::ExecutionConfig;
use crate::node::{FnNode, Node};
use crate::state::{State, StateSchema};
use crate::{END, START};

/// Builder for constructing a state graph.
///
/// Every method validates its arguments against the nodes registered so far,
/// so nodes must be added before the edges that reference them.
pub struct StateGraph<S: State> {
    nodes: HashMap<String, Box<dyn Node<S>>>,
    edges: Vec<Edge>,
    conditional_edges: Vec<ConditionalEdge<S>>,
    entry_point: Option<String>,
    strict: bool,
    schema: Option<Box<dyn StateSchema<S>>>,
    config: ExecutionConfig,
}

impl<S: State> StateGraph<S> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: Vec::new(),
            conditional_edges: Vec::new(),
            entry_point: None,
            strict: false,
            schema: None,
            config: ExecutionConfig::default(),
        }
    }

    /// Add a named node to the graph.
    pub fn add_node(
        mut self,
        name: impl Into<String>,
        node: impl Node<S> + 'static,
    ) -> Result<Self, GraphError> {
        let name = name.into();
        if name.is_empty() || name == START || name == END {
            return Err(GraphError::InvalidNodeId(name));
        }
        if self.nodes.contains_key(&name) {
            return Err(GraphError::DuplicateNode(name));
        }
        self.nodes.insert(name, Box::new(node));
        Ok(self)
    }

    /// Add a named node backed by a plain function.
    pub fn add_fn_node<F>(self, name: impl Into<String>, func: F) -> Result<Self, GraphError>
    where
        F: Fn(&S) -> Result<S::Update, NodeError> + Send + Sync + 'static,
    {
        self.add_node(name, FnNode::new(func))
    }

    /// Set the entry point node for graph execution.
    ///
    /// Calling this again replaces the previous entry point; the last call wins.
    pub fn set_entry_point(mut self, name: impl Into<String>) -> Result<Self, GraphError> {
        let name = name.into();
        self.require_node(&name, NodeRole::Entry)?;
        self.entry_point = Some(name);
        Ok(self)
    }

    /// Add a fixed edge from source to target. `target` may be [`END`].
    pub fn add_edge(
        mut self,
        source: impl Into<String>,
        target: impl Into<Target>,
    ) -> Result<Self, GraphError> {
        let source = source.into();
        let target = target.into();
        self.require_node(&source, NodeRole::Source)?;
        self.require_target(&target, NodeRole::Target)?;
        self.edges.push(Edge { source, target });
        Ok(self)
    }

    /// Add a conditional edge. After `source` runs, `router` is applied to the
    /// merged state and its key is looked up in `branches`.
    pub fn add_conditional_edges<K, T>(
        self,
        source: impl Into<String>,
        router: impl Fn(&S) -> String + Send + Sync + 'static,
        branches: impl IntoIterator<Item = (K, T)>,
    ) -> Result<Self, GraphError>
    where
        K: Into<String>,
        T: Into<Target>,
    {
        self.add_fallible_conditional_edges(source, move |state: &S| Ok(router(state)), branches)
    }

    /// Like [`add_conditional_edges`](Self::add_conditional_edges), for routers
    /// that can fail.
    pub fn add_fallible_conditional_edges<K, T>(
        mut self,
        source: impl Into<String>,
        router: impl Fn(&S) -> Result<String, NodeError> + Send + Sync + 'static,
        branches: impl IntoIterator<Item = (K, T)>,
    ) -> Result<Self, GraphError>
    where
        K: Into<String>,
        T: Into<Target>,
    {
        let source = source.into();
        self.require_node(&source, NodeRole::Source)?;

        let branches: BTreeMap<String, Target> = branches
            .into_iter()
            .map(|(key, target)| (key.into(), target.into()))
            .collect();
        for target in branches.values() {
            self.require_target(target, NodeRole::BranchTarget)?;
        }

        self.conditional_edges.push(ConditionalEdge {
            source,
            router: Arc::new(router),
            branches,
        });
        Ok(self)
    }

    /// Reject unreachable nodes at compile time instead of logging a warning.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Validate the initial state and every merged state against `schema`.
    pub fn with_schema(mut self, schema: impl StateSchema<S> + 'static) -> Self {
        self.schema = Some(Box::new(schema));
        self
    }

    /// Execution limits used by [`CompiledGraph::invoke`].
    pub fn with_config(mut self, config: ExecutionConfig) -> Self {
        self.config = config;
        self
    }

    /// Compile the graph into an executable CompiledGraph.
    ///
    /// A node without an outgoing edge is terminal: execution ends after it runs.
    pub fn compile(self) -> Result<CompiledGraph<S>, GraphError> {
        let entry = self
            .entry_point
            .clone()
            .ok_or(GraphError::MissingEntryPoint)?;

        let unreachable = self.unreachable_nodes(&entry);
        if !unreachable.is_empty() {
            if self.strict {
                return Err(GraphError::UnreachableNode(unreachable));
            }
            tracing::warn!(nodes = ?unreachable, "graph has nodes unreachable from '{entry}'");
        }

        let mut transitions: HashMap<String, Transition<S>> = HashMap::new();
        for edge in self.edges {
            if transitions.contains_key(&edge.source) {
                return Err(GraphError::ConflictingEdge(edge.source));
            }
            transitions.insert(edge.source, Transition::Fixed(edge.target));
        }
        for ce in self.conditional_edges {
            if transitions.contains_key(&ce.source) {
                return Err(GraphError::ConflictingEdge(ce.source));
            }
            transitions.insert(ce.source.clone(), Transition::Conditional(ce));
        }

        tracing::debug!(
            entry = %entry,
            nodes = self.nodes.len(),
            edges = transitions.len(),
            "graph compiled"
        );

        Ok(CompiledGraph {
            nodes: self.nodes,
            transitions,
            entry_point: entry,
            schema: self.schema,
            config: self.config,
        })
    }

    fn require_node(&self, name: &str, role: NodeRole) -> Result<(), GraphError> {
        if self.nodes.contains_key(name) {
            Ok(())
        } else {
            Err(GraphError::UnknownNode {
                id: name.to_string(),
                role,
            })
        }
    }

    fn require_target(&self, target: &Target, role: NodeRole) -> Result<(), GraphError> {
        match target.node() {
            Some(name) => self.require_node(name, role),
            None => Ok(()),
        }
    }

    /// Registered nodes not reachable from `entry` along any edge or branch, sorted.
    fn unreachable_nodes(&self, entry: &str) -> Vec<String> {
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &self.edges {
            if let Some(target) = edge.target.node() {
                adjacency.entry(&edge.source).or_default().push(target);
            }
        }
        for ce in &self.conditional_edges {
            for target in ce.branches.values().filter_map(Target::node) {
                adjacency.entry(&ce.source).or_default().push(target);
            }
        }

        let mut seen: HashSet<&str> = HashSet::from([entry]);
        let mut queue: VecDeque<&str> = VecDeque::from([entry]);
        while let Some(current) = queue.pop_front() {
            for &next in adjacency.get(current).into_iter().flatten() {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        let mut unreachable: Vec<String> = self
            .nodes
            .keys()
            .filter(|name| !seen.contains(name.as_str()))
            .cloned()
            .collect();
        unreachable.sort();
        unreachable
    }
}

impl<S: State> Default for StateGraph<S> {
    fn default() -> Self {
        Self::new()
    }
}
