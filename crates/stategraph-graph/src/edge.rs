use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use stategraph_core::NodeError;

use crate::END;

/// Where an edge leads: a registered node or the terminal marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Target {
    Node(String),
    End,
}

impl Target {
    /// The node id, or `None` for the terminal marker.
    pub fn node(&self) -> Option<&str> {
        match self {
            Target::Node(id) => Some(id),
            Target::End => None,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Target::End)
    }

    /// The node id, or [`END`] for the terminal marker.
    pub fn as_str(&self) -> &str {
        match self {
            Target::Node(id) => id,
            Target::End => END,
        }
    }
}

impl From<&str> for Target {
    fn from(s: &str) -> Self {
        if s == END {
            Target::End
        } else {
            Target::Node(s.to_string())
        }
    }
}

impl From<String> for Target {
    fn from(s: String) -> Self {
        if s == END {
            Target::End
        } else {
            Target::Node(s)
        }
    }
}

impl From<&String> for Target {
    fn from(s: &String) -> Self {
        Target::from(s.as_str())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fixed edge from source node to target.
#[derive(Debug, Clone)]
pub struct Edge {
    pub source: String,
    pub target: Target,
}

/// A routing function that inspects post-merge state and returns a branch key.
pub type RouterFn<S> = Arc<dyn Fn(&S) -> Result<String, NodeError> + Send + Sync>;

/// A conditional edge from source node to a branch chosen at run time.
pub struct ConditionalEdge<S> {
    pub source: String,
    pub router: RouterFn<S>,
    /// Branch key -> target.
    pub branches: BTreeMap<String, Target>,
}

impl<S> fmt::Debug for ConditionalEdge<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionalEdge")
            .field("source", &self.source)
            .field("branches", &self.branches)
            .finish_non_exhaustive()
    }
}

/// The single outgoing edge specification of a compiled node.
pub(crate) enum Transition<S> {
    Fixed(Target),
    Conditional(ConditionalEdge<S>),
}

impl<S> Transition<S> {
    /// Every statically known target of this transition.
    pub(crate) fn targets(&self) -> Vec<&Target> {
        match self {
            Transition::Fixed(target) => vec![target],
            Transition::Conditional(ce) => ce.branches.values().collect(),
        }
    }
}
