use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use stategraph_core::{ExecutionTrace, GraphError, NodeError, NodeRole};

use crate::compiled::CompiledGraph;
use crate::edge::{Target, Transition};
use crate::state::State;

/// Default bound on the number of node executions per invocation.
pub const DEFAULT_MAX_STEPS: usize = 10_000;

/// Limits applied to a single invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Maximum number of nodes executed before failing with
    /// [`GraphError::StepLimitExceeded`].
    pub max_steps: usize,
    /// Wall-clock budget, checked once before each step. Serialized in
    /// milliseconds as `deadline_ms`.
    #[serde(rename = "deadline_ms", with = "deadline_ms")]
    pub deadline: Option<Duration>,
}

impl ExecutionConfig {
    pub fn new() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            deadline: None,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self::new()
    }
}

mod deadline_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, ser: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => ser.serialize_some(&(d.as_millis() as u64)),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(de)?.map(Duration::from_millis))
    }
}

/// Where an execution currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// The named node runs on the next step.
    Running(String),
    Succeeded,
    Failed,
}

/// An event yielded after each node executes.
#[derive(Debug, Clone)]
pub struct GraphEvent<S> {
    /// The node that just executed.
    pub node: String,
    /// 1-based step number.
    pub step: usize,
    /// The merged state after the node ran.
    pub state: S,
}

/// One in-flight invocation of a [`CompiledGraph`].
///
/// Owns the evolving state and trace. Drive it with [`step`](Self::step),
/// iterate it for a [`GraphEvent`] per node, or [`run`](Self::run) it to
/// completion. After a failure the partial state is discarded.
pub struct Execution<'g, S: State> {
    graph: &'g CompiledGraph<S>,
    config: ExecutionConfig,
    state: Option<S>,
    status: ExecutionStatus,
    trace: ExecutionTrace,
    started: Instant,
    span: tracing::Span,
}

impl<'g, S: State> Execution<'g, S> {
    pub(crate) fn new(graph: &'g CompiledGraph<S>, state: S, config: ExecutionConfig) -> Self {
        let trace = ExecutionTrace::new();
        let span = tracing::info_span!(
            "graph.invoke",
            run_id = %trace.run_id(),
            entry = %graph.entry_point,
        );
        Self {
            graph,
            config,
            state: Some(state),
            status: ExecutionStatus::Running(graph.entry_point.clone()),
            trace,
            started: Instant::now(),
            span,
        }
    }

    pub fn status(&self) -> &ExecutionStatus {
        &self.status
    }

    pub fn trace(&self) -> &ExecutionTrace {
        &self.trace
    }

    /// Current state; `None` once the execution has failed.
    pub fn state(&self) -> Option<&S> {
        self.state.as_ref()
    }

    /// Final state, available only after success.
    pub fn into_state(self) -> Option<S> {
        match self.status {
            ExecutionStatus::Succeeded => self.state,
            _ => None,
        }
    }

    /// Run one node. Returns `Ok(None)` once the execution is no longer running.
    pub fn step(&mut self) -> Result<Option<GraphEvent<S>>, GraphError> {
        let Some(node) = self.advance()? else {
            return Ok(None);
        };
        let state = self
            .state
            .clone()
            .ok_or_else(|| already_failed(&node))?;
        Ok(Some(GraphEvent {
            node,
            step: self.trace.len(),
            state,
        }))
    }

    /// Run until the terminal marker or the first failure.
    pub fn run(mut self) -> Result<(S, ExecutionTrace), GraphError> {
        while self.advance()?.is_some() {}
        match self.state.take() {
            Some(state) if self.status == ExecutionStatus::Succeeded => Ok((state, self.trace)),
            _ => Err(already_failed(
                self.trace.last().unwrap_or(self.graph.entry_point.as_str()),
            )),
        }
    }

    /// Execute the current node and resolve its successor. Returns the name of
    /// the node that ran.
    fn advance(&mut self) -> Result<Option<String>, GraphError> {
        let ExecutionStatus::Running(current) = &self.status else {
            return Ok(None);
        };
        let current = current.clone();
        let span = self.span.clone();
        let _enter = span.enter();

        match self.run_node(&current) {
            Ok(Target::End) => {
                self.status = ExecutionStatus::Succeeded;
                tracing::debug!(steps = self.trace.len(), "graph run succeeded");
            }
            Ok(Target::Node(next)) => {
                self.status = ExecutionStatus::Running(next);
            }
            Err(e) => {
                self.status = ExecutionStatus::Failed;
                self.state = None;
                tracing::error!(node = %current, error = %e, "graph run failed");
                return Err(e);
            }
        }
        Ok(Some(current))
    }

    fn run_node(&mut self, current: &str) -> Result<Target, GraphError> {
        if self.trace.len() >= self.config.max_steps {
            return Err(GraphError::StepLimitExceeded {
                max_steps: self.config.max_steps,
                trace: self.trace.clone(),
            });
        }
        if let Some(deadline) = self.config.deadline {
            if self.started.elapsed() >= deadline {
                return Err(GraphError::DeadlineExceeded {
                    deadline,
                    trace: self.trace.clone(),
                });
            }
        }

        let graph = self.graph;
        let node = graph
            .nodes
            .get(current)
            .ok_or_else(|| GraphError::UnknownNode {
                id: current.to_string(),
                role: NodeRole::Target,
            })?;
        let state = self.state.as_mut().ok_or_else(|| already_failed(current))?;

        self.trace.push(current);
        tracing::debug!(node = %current, step = self.trace.len(), "running node");

        let update = guarded(current, || node.process(state))?;
        state.merge(update);

        if let Some(schema) = &graph.schema {
            schema
                .validate(state)
                .map_err(|source| GraphError::InvalidState {
                    node: current.to_string(),
                    source,
                })?;
        }

        match graph.transitions.get(current) {
            None => Ok(Target::End),
            Some(Transition::Fixed(target)) => Ok(target.clone()),
            Some(Transition::Conditional(ce)) => {
                let key = guarded(current, || (ce.router)(state))?;
                tracing::debug!(node = %current, branch = %key, "conditional edge resolved");
                ce.branches
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| GraphError::UnmappedBranch {
                        node: current.to_string(),
                        key,
                    })
            }
        }
    }
}

impl<S: State> Iterator for Execution<'_, S> {
    type Item = Result<GraphEvent<S>, GraphError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.step().transpose()
    }
}

/// Call a node or router, turning both returned errors and panics into
/// [`GraphError::Execution`] attributed to `node`.
fn guarded<T>(
    node: &str,
    f: impl FnOnce() -> Result<T, NodeError>,
) -> Result<T, GraphError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(GraphError::Execution {
            node: node.to_string(),
            source,
        }),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(GraphError::Execution {
                node: node.to_string(),
                source: format!("node panicked: {message}").into(),
            })
        }
    }
}

fn already_failed(node: &str) -> GraphError {
    GraphError::Execution {
        node: node.to_string(),
        source: "execution already failed".into(),
    }
}
