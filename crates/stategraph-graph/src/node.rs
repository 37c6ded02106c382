use std::marker::PhantomData;

use stategraph_core::NodeError;

use crate::State;

/// A node in the graph that processes state.
///
/// `process` reads the current state and returns only the fields it changes
/// or adds.
pub trait Node<S: State>: Send + Sync {
    fn process(&self, state: &S) -> Result<S::Update, NodeError>;
}

/// Wraps a function as a Node.
pub struct FnNode<S, F>
where
    S: State,
    F: Fn(&S) -> Result<S::Update, NodeError> + Send + Sync,
{
    func: F,
    _marker: PhantomData<S>,
}

impl<S, F> FnNode<S, F>
where
    S: State,
    F: Fn(&S) -> Result<S::Update, NodeError> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self {
            func,
            _marker: PhantomData,
        }
    }
}

impl<S, F> Node<S> for FnNode<S, F>
where
    S: State,
    F: Fn(&S) -> Result<S::Update, NodeError> + Send + Sync,
{
    fn process(&self, state: &S) -> Result<S::Update, NodeError> {
        (self.func)(state)
    }
}
